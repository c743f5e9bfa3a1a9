use convert_case::Case;
use convert_case::Casing;
use darling::FromDeriveInput;
use darling::FromField;
use darling::util::Override;
use proc_macro2::Ident;
use proc_macro2::TokenStream as TokenStream2;
use quote::format_ident;
use quote::quote;
use syn::DeriveInput;
use syn::Type;
use syn::ext::IdentExt;

#[derive(Debug, FromField)]
#[darling(attributes(ferret))]
struct FieldReceiver {
    pub ident: Option<Ident>,
    pub ty:    Type,

    #[darling(default)]
    pub column: Option<Override<String>>,

    #[darling(default, rename = "type")]
    pub type_tag: Option<String>,

    #[darling(default)]
    pub default: Option<String>,

    #[darling(default)]
    pub not_null: bool,

    #[darling(default)]
    pub primary_key: bool,

    #[darling(default)]
    pub belongs_to: Option<String>,

    #[darling(default)]
    pub has_many: Option<String>,

    #[darling(default)]
    pub has_one: Option<String>,

    #[darling(default)]
    pub fk: Option<String>,

    #[darling(default)]
    pub key: Option<String>,

    #[darling(default)]
    pub through: Option<String>,

    #[darling(default)]
    pub transient: bool,

    #[darling(default)]
    pub component: bool,
}

#[derive(Debug, FromDeriveInput)]
#[darling(attributes(ferret), supports(struct_named))]
struct DocumentReceiver {
    pub ident: Ident,
    pub data:  darling::ast::Data<(), FieldReceiver>,

    #[darling(default)]
    pub table: Option<String>,

    #[darling(default)]
    pub init: Option<String>,
}

#[derive(Debug)]
enum Tagged {
    Column {
        column:      String,
        type_tag:    Option<String>,
        default:     Option<String>,
        not_null:    bool,
        primary_key: bool,
    },
    Relation {
        kind:        RelationKind,
        table:       String,
        foreign_key: Option<String>,
        key:         Option<String>,
        through:     Option<String>,
    },
    Transient,
    Component,
}

#[derive(Debug, Clone, Copy)]
enum RelationKind {
    BelongsTo,
    HasMany,
    HasOne,
}

#[derive(Debug)]
struct MemberInfo {
    pub field_name:  Ident,
    /// Member name as seen by `get`/`set`
    pub member_name: String,
    pub field_type:  Type,
    /// `None` for untagged members, which the registry never sees
    pub tagged:      Option<Tagged>,
}

#[derive(Debug)]
struct DocumentInfo {
    pub struct_name: Ident,
    pub table_name:  String,
    pub init:        Option<Ident>,
    pub members:     Vec<MemberInfo>,
}

impl FieldReceiver {
    pub fn to_member_info(self) -> darling::Result<MemberInfo> {
        let field_name = self.ident.clone().ok_or_else(|| darling::Error::custom("Expected named field"))?;
        let member_name = field_name.unraw().to_string();

        let relations: Vec<(RelationKind, String)> = [
            (RelationKind::BelongsTo, self.belongs_to.clone()),
            (RelationKind::HasMany, self.has_many.clone()),
            (RelationKind::HasOne, self.has_one.clone()),
        ]
        .into_iter()
        .filter_map(|(kind, table)| table.map(|t| (kind, t)))
        .collect();

        let is_column = self.column.is_some()
            || self.type_tag.is_some()
            || self.default.is_some()
            || self.not_null
            || self.primary_key;
        let has_relation_keys = self.fk.is_some() || self.key.is_some() || self.through.is_some();

        let categories =
            [is_column, !relations.is_empty(), self.transient, self.component].iter().filter(|set| **set).count();

        if relations.len() > 1 {
            return Err(darling::Error::custom("a member declares at most one of belongs_to, has_many and has_one")
                .with_span(&field_name));
        }
        if categories > 1 {
            return Err(darling::Error::custom(
                "column, relation, transient and component tags cannot be combined on one member",
            )
            .with_span(&field_name));
        }
        if has_relation_keys && relations.is_empty() {
            return Err(darling::Error::custom("fk, key and through only apply to relation members")
                .with_span(&field_name));
        }

        let tagged = if is_column {
            let column = match self.column {
                Some(Override::Explicit(name)) => name,
                _ => member_name.clone(),
            };
            Some(Tagged::Column {
                column,
                type_tag: self.type_tag,
                default: self.default,
                not_null: self.not_null,
                primary_key: self.primary_key,
            })
        } else if let Some((kind, table)) = relations.into_iter().next() {
            Some(Tagged::Relation { kind, table, foreign_key: self.fk, key: self.key, through: self.through })
        } else if self.transient {
            Some(Tagged::Transient)
        } else if self.component {
            Some(Tagged::Component)
        } else {
            None
        };

        Ok(MemberInfo { field_name, member_name, field_type: self.ty, tagged })
    }
}

impl DocumentReceiver {
    pub fn to_document_info(self) -> darling::Result<DocumentInfo> {
        let table_name = self.table.unwrap_or_else(|| self.ident.to_string().to_case(Case::Snake));
        let init = self.init.map(|method| format_ident!("{}", method));

        let fields = self.data.take_struct().ok_or_else(|| darling::Error::unsupported_shape("enum"))?.fields;

        let mut errors = darling::Error::accumulator();
        let members = fields.into_iter().filter_map(|f| errors.handle(f.to_member_info())).collect();
        errors.finish()?;

        Ok(DocumentInfo { struct_name: self.ident, table_name, init, members })
    }
}

/// Derive `ferret::Document` from `#[ferret(...)]` member tags.
#[proc_macro_derive(Document, attributes(ferret))]
pub fn derive_document(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);

    let info = match DocumentReceiver::from_derive_input(&input).and_then(DocumentReceiver::to_document_info) {
        Ok(info) => info,
        Err(e) => return e.write_errors().into(),
    };

    proc_macro::TokenStream::from(impl_document(&info))
}

fn impl_document(info: &DocumentInfo) -> TokenStream2 {
    let name = &info.struct_name;
    let table_name = &info.table_name;

    let member_decls: Vec<_> = info.members.iter().filter_map(member_declaration).collect();

    let valued: Vec<_> = info
        .members
        .iter()
        .filter(|m| matches!(m.tagged, Some(Tagged::Column { .. } | Tagged::Transient)))
        .collect();

    let get_arms: Vec<_> = valued
        .iter()
        .map(|m| {
            let field_name = &m.field_name;
            let member_name = &m.member_name;
            quote! {
                #member_name => Some(ferret::IntoValue::into_value(::std::clone::Clone::clone(&self.#field_name)))
            }
        })
        .collect();

    let set_arms: Vec<_> = valued
        .iter()
        .map(|m| {
            let field_name = &m.field_name;
            let member_name = &m.member_name;
            quote! {
                #member_name => {
                    self.#field_name = ferret::FromValue::from_value(value)?;
                    Ok(())
                }
            }
        })
        .collect();

    let value_param = if set_arms.is_empty() { format_ident!("_value") } else { format_ident!("value") };

    let slot_arms: Vec<_> = info
        .members
        .iter()
        .filter(|m| matches!(m.tagged, Some(Tagged::Relation { .. })))
        .map(|m| {
            let field_name = &m.field_name;
            let member_name = &m.member_name;
            quote! {
                #member_name => Some(&mut self.#field_name as &mut dyn ::std::any::Any)
            }
        })
        .collect();

    let components: Vec<_> = info
        .members
        .iter()
        .filter(|m| matches!(m.tagged, Some(Tagged::Component)))
        .map(|m| {
            let field_name = &m.field_name;
            quote! { &mut self.#field_name as &mut dyn ferret::Component }
        })
        .collect();

    let init = info.init.as_ref().map(|method| {
        quote! {
            fn init(&mut self) {
                self.#method();
            }
        }
    });

    quote! {
        impl ferret::Document for #name {
            fn table_name() -> &'static str {
                #table_name
            }

            fn members() -> Vec<ferret::metadata::Member> {
                vec![#(#member_decls),*]
            }

            fn get_member(&self, member: &str) -> Option<ferret::Value> {
                match member {
                    #(#get_arms,)*
                    _ => None,
                }
            }

            fn set_member(&mut self, member: &str, #value_param: ferret::Value) -> ferret::Result<()> {
                match member {
                    #(#set_arms)*
                    _ => Err(ferret::Error::UnknownField(member.to_string())),
                }
            }

            fn relation_slot(&mut self, member: &str) -> Option<&mut dyn ::std::any::Any> {
                match member {
                    #(#slot_arms,)*
                    _ => None,
                }
            }

            fn components(&mut self) -> Vec<&mut dyn ferret::Component> {
                vec![#(#components),*]
            }

            #init
        }
    }
}

fn member_declaration(member: &MemberInfo) -> Option<TokenStream2> {
    let member_name = &member.member_name;

    let tokens = match member.tagged.as_ref()? {
        Tagged::Column { column, type_tag, default, not_null, primary_key } => {
            let inferred = rust_type_to_column_type(&member.field_type);
            let mut tags = quote! { ferret::metadata::ColumnTags::new(#column, #inferred) };
            if *primary_key {
                tags = quote! { #tags.primary_key() };
            }
            if *not_null {
                tags = quote! { #tags.not_null() };
            }
            if let Some(tag) = type_tag {
                tags = quote! { #tags.type_tag(#tag) };
            }
            if let Some(literal) = default {
                tags = quote! { #tags.default(#literal) };
            }
            quote! { ferret::metadata::Member::column(#member_name, #tags) }
        }
        Tagged::Relation { kind, table, foreign_key, key, through } => {
            let kind = match kind {
                RelationKind::BelongsTo => quote! { ferret::metadata::RelationKind::BelongsTo },
                RelationKind::HasMany => quote! { ferret::metadata::RelationKind::HasMany },
                RelationKind::HasOne => quote! { ferret::metadata::RelationKind::HasOne },
            };
            let mut tags = quote! { ferret::metadata::RelationTags::new(#kind, #table) };
            if let Some(fk) = foreign_key {
                tags = quote! { #tags.foreign_key(#fk) };
            }
            if let Some(key) = key {
                tags = quote! { #tags.key(#key) };
            }
            if let Some(through) = through {
                tags = quote! { #tags.through(#through) };
            }
            quote! { ferret::metadata::Member::relation(#member_name, #tags) }
        }
        Tagged::Transient => quote! { ferret::metadata::Member::transient(#member_name) },
        Tagged::Component => quote! { ferret::metadata::Member::component(#member_name) },
    };

    Some(tokens)
}

fn rust_type_to_column_type(ty: &Type) -> TokenStream2 {
    let inner_type = extract_generic_inner_type(ty, "Option").unwrap_or(ty);

    let Type::Path(type_path) = inner_type else {
        return quote! { ferret::ColumnType::Text };
    };
    let Some(segment) = type_path.path.segments.last() else {
        return quote! { ferret::ColumnType::Text };
    };

    match segment.ident.to_string().as_str() {
        "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "bool" => quote! { ferret::ColumnType::Integer },
        "f32" | "f64" => quote! { ferret::ColumnType::Float },
        "Vec" if is_byte_vec(inner_type) => quote! { ferret::ColumnType::Blob },
        _ => quote! { ferret::ColumnType::Text },
    }
}

fn is_byte_vec(ty: &Type) -> bool {
    match extract_generic_inner_type(ty, "Vec") {
        Some(Type::Path(inner)) => inner.path.segments.last().is_some_and(|seg| seg.ident == "u8"),
        _ => false,
    }
}

fn extract_generic_inner_type<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == wrapper {
                if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                        return Some(inner);
                    }
                }
            }
        }
    }
    None
}
