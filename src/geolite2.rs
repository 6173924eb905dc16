//! GeoLite2-Country convenience wrapper.
//!
//! Servers typically open one of these at startup and swap in a fresh one
//! when MaxMind publishes an update. For anything beyond the country code,
//! use [`CountryDatabase::database`] and look up the full record.

use crate::data_section::DataValue;
use crate::database::Database;
use crate::error::{MmdbError, Result};
use crate::mmdb::tree::SearchResult;
use crate::open_options::OpenOptions;
use std::net::IpAddr;
use std::path::Path;

/// `database_type` of the GeoLite2 country database
pub const COUNTRY_DATABASE_TYPE: &str = "GeoLite2-Country";

/// A database known to be `GeoLite2-Country`
#[derive(Debug)]
pub struct CountryDatabase {
    db: Database,
}

impl CountryDatabase {
    /// Memory-map a GeoLite2-Country file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = OpenOptions::new()
            .database_type(COUNTRY_DATABASE_TYPE)
            .open(path)?;
        Ok(Self { db })
    }

    /// Open a GeoLite2-Country image held in memory
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let db = OpenOptions::new()
            .database_type(COUNTRY_DATABASE_TYPE)
            .open_bytes(bytes)?;
        Ok(Self { db })
    }

    /// Wrap an already open database, checking its type
    pub fn from_database(db: Database) -> Result<Self> {
        if db.database_type() != COUNTRY_DATABASE_TYPE {
            return Err(MmdbError::InvalidDatabaseType {
                expected: COUNTRY_DATABASE_TYPE.to_string(),
                found: db.database_type().to_string(),
            });
        }
        Ok(Self { db })
    }

    /// The underlying database
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Two-letter ISO country code for a textual address
    ///
    /// `Ok(None)` when the address has no record (including a tree walk that
    /// runs out of address bits on a node) or the record has no
    /// `country.iso_code` string. A corrupt tree or record is an `Err`.
    pub fn country_code(&self, addr: &str) -> Result<Option<String>> {
        iso_code(self.db.lookup_str(addr))
    }

    /// Two-letter ISO country code for a parsed address
    pub fn country_code_ip(&self, addr: IpAddr) -> Result<Option<String>> {
        iso_code(self.db.lookup_ip(addr))
    }
}

fn iso_code(result: SearchResult) -> Result<Option<String>> {
    match result {
        SearchResult::Found(record) => Ok(record
            .get_path(&["country", "iso_code"])
            .and_then(DataValue::as_str)
            .map(str::to_string)),
        SearchResult::NotFound | SearchResult::Partial(_) => Ok(None),
        SearchResult::Failed(e) => Err(e),
    }
}
