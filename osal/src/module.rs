// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Loadable modules and symbol lookup.

use std::io::Write;

use bitflags::bitflags;
use handle_table::SharedToken;

use crate::backend::{Backend, ModuleImpl, Platform};
use crate::config::{MAX_NAME_LEN, MAX_SYM_LEN};
use crate::error::{Error, Result};
use crate::file::validate_path;
use crate::id::{ObjectId, ObjectType};
use crate::state::tables;
use crate::task::current_creator;

bitflags! {
    /// Symbol visibility of a loaded module. Without `GLOBAL` the module's
    /// symbols stay local to lookups through its own id.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModuleFlags: u32 {
        const GLOBAL = 1 << 0;
    }
}

pub(crate) struct ModuleObj {
    module: <Platform as Backend>::Module,
    path: String,
}

fn token(id: ObjectId) -> Result<SharedToken<'static, ModuleObj>> {
    let key = id.key_as(ObjectType::Module).ok_or(Error::InvalidId)?;
    Ok(tables().modules.shared(key)?)
}

/// Loads the module at `path` under the handle name `name`.
pub fn load(name: &str, path: &str, flags: ModuleFlags) -> Result<ObjectId> {
    validate_path(path)?;
    let reservation = tables().modules.reserve(name, current_creator())?;
    let module = <Platform as Backend>::Module::load(path, flags)?;
    let key = reservation.commit(ModuleObj {
        module,
        path: path.to_owned(),
    });
    let id = ObjectId::from_parts(ObjectType::Module, key);
    tracing::debug!(?id, name, path, "module loaded");
    Ok(id)
}

/// Unloads the module. Fails without freeing the handle if the platform
/// refuses the unload.
pub fn unload(id: ObjectId) -> Result<()> {
    let key = id.key_as(ObjectType::Module).ok_or(Error::InvalidId)?;
    let pending = tables().modules.begin_delete(key)?;
    match pending.payload().module.unload() {
        Ok(()) | Err(Error::InvalidId) => {
            pending.finish();
            Ok(())
        }
        Err(err) => {
            pending.cancel();
            Err(err)
        }
    }
}

/// Resolves `symbol` within the module.
pub fn symbol_lookup(id: ObjectId, symbol: &str) -> Result<usize> {
    token(id)?.module.symbol(symbol)
}

/// Resolves `symbol` across every globally visible module.
pub fn global_symbol_lookup(symbol: &str) -> Result<usize> {
    if symbol.is_empty() {
        return Err(Error::InvalidPointer);
    }
    Platform::global_symbol_lookup(symbol)
}

pub fn get_id_by_name(name: &str) -> Result<ObjectId> {
    if name.len() > MAX_NAME_LEN {
        return Err(Error::NameTooLong);
    }
    tables()
        .modules
        .find_by_name(name)
        .map(|key| ObjectId::from_parts(ObjectType::Module, key))
        .ok_or(Error::NameNotFound)
}

#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub name: String,
    pub creator: ObjectId,
    pub path: String,
    /// Module entry point, where the platform loader exposes one.
    pub entry_point: Option<usize>,
    /// Load address range, where the platform loader exposes one.
    pub addr_range: Option<(usize, usize)>,
}

pub fn get_info(id: ObjectId) -> Result<ModuleInfo> {
    let key = id.key_as(ObjectType::Module).ok_or(Error::InvalidId)?;
    let token = tables().modules.shared(key)?;
    let entry = tables().modules.info(key)?;
    Ok(ModuleInfo {
        name: entry.name,
        creator: ObjectId::from_u32(entry.creator),
        path: token.path.clone(),
        entry_point: None,
        addr_range: None,
    })
}

/// Dumps the global symbol table to `path` as a sequence of fixed records,
/// stopping with `OutputTooLarge` before exceeding `size_limit` bytes.
///
/// Record layout: the symbol name, NUL-padded to the configured maximum
/// symbol length, followed by the 32-bit symbol value in target endianness.
pub fn symbol_table_dump(path: &str, size_limit: u64) -> Result<()> {
    validate_path(path)?;
    Platform::symbol_table_dump(path, size_limit)
}

/// Fixed-record writer used by back-ends that can enumerate their symbol
/// table.
pub struct SymbolDumpWriter {
    out: std::io::BufWriter<std::fs::File>,
    limit: u64,
    written: u64,
}

impl SymbolDumpWriter {
    const RECORD_SIZE: u64 = (MAX_SYM_LEN + 4) as u64;

    pub fn create(path: &str, size_limit: u64) -> Result<Self> {
        let file = std::fs::File::create(path).map_err(|_| Error::FileError)?;
        Ok(Self {
            out: std::io::BufWriter::new(file),
            limit: size_limit,
            written: 0,
        })
    }

    /// Appends one `{name, value}` record.
    pub fn record(&mut self, name: &str, value: u32) -> Result<()> {
        if name.len() > MAX_SYM_LEN {
            return Err(Error::NameTooLong);
        }
        if self.written + Self::RECORD_SIZE > self.limit {
            return Err(Error::OutputTooLarge);
        }

        let mut record = [0u8; MAX_SYM_LEN + 4];
        record[..name.len()].copy_from_slice(name.as_bytes());
        record[MAX_SYM_LEN..].copy_from_slice(&value.to_ne_bytes());

        self.out.write_all(&record).map_err(|_| Error::FileError)?;
        self.written += Self::RECORD_SIZE;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.out.flush().map_err(|_| Error::FileError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_records_are_fixed_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("symtab.dat");
        let path = path.to_str().unwrap();

        let mut writer = SymbolDumpWriter::create(path, 1024).unwrap();
        writer.record("alpha", 0x1122_3344).unwrap();
        writer.record("beta", 0xDEAD_BEEF).unwrap();
        writer.finish().unwrap();

        let bytes = std::fs::read(path).unwrap();
        assert_eq!(bytes.len(), 2 * (MAX_SYM_LEN + 4));

        assert_eq!(&bytes[..5], b"alpha");
        assert!(bytes[5..MAX_SYM_LEN].iter().all(|&b| b == 0));
        assert_eq!(
            bytes[MAX_SYM_LEN..MAX_SYM_LEN + 4],
            0x1122_3344u32.to_ne_bytes()
        );

        let second = &bytes[MAX_SYM_LEN + 4..];
        assert_eq!(&second[..4], b"beta");
        assert_eq!(second[MAX_SYM_LEN..], 0xDEAD_BEEFu32.to_ne_bytes());
    }

    #[test]
    fn dump_respects_the_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("symtab.dat");
        let path = path.to_str().unwrap();

        let mut writer = SymbolDumpWriter::create(path, SymbolDumpWriter::RECORD_SIZE).unwrap();
        writer.record("fits", 1).unwrap();
        assert_eq!(writer.record("spills", 2).unwrap_err(), Error::OutputTooLarge);
    }

    #[test]
    fn over_long_symbol_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("symtab.dat");
        let mut writer = SymbolDumpWriter::create(path.to_str().unwrap(), 1024).unwrap();
        let long = "s".repeat(MAX_SYM_LEN + 1);
        assert_eq!(writer.record(&long, 0).unwrap_err(), Error::NameTooLong);
    }
}
