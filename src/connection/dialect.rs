/// How positional parameters are written in generated SQL
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placeholder {
    /// `?` markers (SQLite, Turso, MySQL)
    Question,
    /// `$1, $2, ...` markers (PostgreSQL)
    Dollar,
}

/// How the primary key of a freshly inserted row is recovered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertId {
    /// Append `RETURNING <pk>` to the INSERT and read the single row back
    Returning,
    /// Run the INSERT, then ask the connection for the last inserted row id
    LastInsertId,
}

/// SQL flavour spoken by an [`Executor`](crate::Executor)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dialect {
    pub placeholder: Placeholder,
    pub insert_id:   InsertId,
}

impl Dialect {
    pub const POSTGRES: Dialect = Dialect { placeholder: Placeholder::Dollar, insert_id: InsertId::Returning };
    pub const SQLITE: Dialect = Dialect { placeholder: Placeholder::Question, insert_id: InsertId::LastInsertId };

    /// Rewrite `?` markers into this dialect's placeholder syntax.
    ///
    /// Markers inside single or double quoted literals are left alone.
    pub fn rebind(&self, sql: &str) -> String {
        if self.placeholder == Placeholder::Question {
            return sql.to_string();
        }

        let mut out = String::with_capacity(sql.len() + 8);
        let mut quote: Option<char> = None;
        let mut n = 0;

        for c in sql.chars() {
            match (quote, c) {
                (Some(q), c) if c == q => {
                    quote = None;
                    out.push(c);
                }
                (Some(_), c) => out.push(c),
                (None, '\'' | '"') => {
                    quote = Some(c);
                    out.push(c);
                }
                (None, '?') => {
                    n += 1;
                    out.push('$');
                    out.push_str(&n.to_string());
                }
                (None, c) => out.push(c),
            }
        }

        out
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::SQLITE
    }
}
