use std::time::Duration;

use super::ConnectionResult;
use super::database::Database;
use super::dialect::Dialect;
use super::opts::DatabaseOpts;

/// Opens a local Turso database
///
/// ```ignore
/// let db = ferret::Builder::new_local(":memory:").with_busy_timeout(Duration::from_secs(5)).build().await?;
/// let conn = db.connect()?;
/// ```
pub struct Builder {
    opts:            DatabaseOpts,
    encryption_opts: Option<turso::EncryptionOpts>,
    vfs:             Option<String>,
}

impl Builder {
    pub fn new_local(path: &str) -> Self {
        Self { opts: DatabaseOpts::local(path), encryption_opts: None, vfs: None }
    }

    pub fn with_mvcc(mut self, mvcc: bool) -> Self {
        self.opts.mvcc = mvcc;
        self
    }

    pub fn experimental_encryption(mut self, enabled: bool) -> Self {
        self.opts.encryption = enabled;
        self
    }

    pub fn with_encryption(mut self, opts: turso::EncryptionOpts) -> Self {
        self.encryption_opts = Some(opts);
        self
    }

    pub fn with_io(mut self, vfs: String) -> Self {
        self.vfs = Some(vfs);
        self
    }

    /// SQL flavour reported by connections from this database
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.opts.dialect = dialect;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = Some(timeout);
        self
    }

    pub async fn build(self) -> ConnectionResult<Database> {
        let Self { opts, encryption_opts, vfs } = self;

        let mut builder = turso::Builder::new_local(&opts.path)
            .with_mvcc(opts.mvcc)
            .experimental_encryption(opts.encryption);
        if let Some(encryption) = encryption_opts {
            builder = builder.with_encryption(encryption);
        }
        if let Some(vfs) = vfs {
            builder = builder.with_io(vfs);
        }

        tracing::debug!("Opening {} (mvcc: {}, encryption: {})", opts.path, opts.mvcc, opts.encryption);
        let db = builder.build().await?;

        Ok(Database::new(db, opts))
    }
}
