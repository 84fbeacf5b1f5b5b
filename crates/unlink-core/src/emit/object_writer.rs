//! [`ObjectSink`] implementation backed by the `object` crate's
//! writer, the same crate `cranelift-object` uses to drive a linker.
//!
//! One `ObjectFileWriter` is built per `FILE` range; each `putmod`
//! opens a new section (one per recovered module) and subsequent
//! `putentry`/`putsimpleref`/`putweirdref` calls attach symbols and
//! relocations to that section until the next `putmod`.

use std::collections::HashMap;

use object::write::{Object, Relocation, Symbol, SymbolSection};
use object::{
    Architecture, BinaryFormat, Endianness, RelocationEncoding, RelocationFlags, RelocationKind,
    SectionKind, SymbolFlags, SymbolKind, SymbolScope,
};

use super::sink::{ObjectSink, FLAG_EXTERNALLY_ACCESSIBLE};

pub struct ObjectFileWriter {
    obj: Object<'static>,
    symbols: HashMap<String, object::write::SymbolId>,
    current_section: Option<object::write::SectionId>,
    current_base: u64,
    comment_section: Option<object::write::SectionId>,
}

impl ObjectFileWriter {
    pub fn new() -> Self {
        ObjectFileWriter {
            // `object` has no M68K architecture variant; `Unknown` keeps the
            // writer format-valid while the CPU-specific content (relocation
            // widths, opcode bytes) stays accurate regardless of the header.
            obj: Object::new(BinaryFormat::Elf, Architecture::Unknown, Endianness::Big),
            symbols: HashMap::new(),
            current_section: None,
            current_base: 0,
            comment_section: None,
        }
    }

    /// Finalizes the object and serializes it to bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.obj.write().unwrap_or_default()
    }

    fn symbol_id(&mut self, name: &str, scope: SymbolScope) -> object::write::SymbolId {
        if let Some(&id) = self.symbols.get(name) {
            return id;
        }
        let id = self.obj.add_symbol(Symbol {
            name: name.as_bytes().to_vec(),
            value: 0,
            size: 0,
            kind: SymbolKind::Label,
            scope,
            weak: false,
            section: SymbolSection::Undefined,
            flags: SymbolFlags::None,
        });
        self.symbols.insert(name.to_string(), id);
        id
    }

    fn add_relocation(&mut self, label: &str, width: u8, site: usize, kind: RelocationKind) {
        let Some(section) = self.current_section else {
            return;
        };
        let symbol = self.symbol_id(label, SymbolScope::Dynamic);
        let _ = self.obj.add_relocation(
            section,
            Relocation {
                offset: self.current_base + site as u64,
                symbol,
                addend: 0,
                flags: RelocationFlags::Generic {
                    kind,
                    encoding: RelocationEncoding::Generic,
                    size: width * 8,
                },
            },
        );
    }
}

impl Default for ObjectFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectSink for ObjectFileWriter {
    fn putfirst(&mut self) {}

    fn putlast(&mut self) {}

    fn putcomment(&mut self, text: &str) {
        let section = *self.comment_section.get_or_insert_with(|| {
            self.obj
                .add_section(Vec::new(), b".comment".to_vec(), SectionKind::OtherString)
        });
        self.obj.append_section_data(section, text.as_bytes(), 1);
        self.obj.append_section_data(section, b"\0", 1);
    }

    fn putdict(&mut self, names: &[String]) {
        for name in names {
            self.symbol_id(name, SymbolScope::Dynamic);
        }
    }

    fn putmod(&mut self, name: &str, flags: u8) {
        let section = self
            .obj
            .add_section(Vec::new(), name.as_bytes().to_vec(), SectionKind::Text);
        self.current_section = Some(section);
        self.current_base = 0;

        let scope = if flags & FLAG_EXTERNALLY_ACCESSIBLE != 0 {
            SymbolScope::Dynamic
        } else {
            SymbolScope::Compilation
        };
        let id = self.obj.add_symbol(Symbol {
            name: name.as_bytes().to_vec(),
            value: 0,
            size: 0,
            kind: SymbolKind::Text,
            scope,
            weak: false,
            section: SymbolSection::Section(section),
            flags: SymbolFlags::None,
        });
        self.symbols.insert(name.to_string(), id);
    }

    fn putsize(&mut self, _n: usize) {
        // The `object` writer derives section size from appended data;
        // this call exists only to mirror the spec's sink interface.
    }

    fn putcontents(&mut self, bytes: &[u8]) {
        let Some(section) = self.current_section else {
            return;
        };
        self.current_base = self.obj.append_section_data(section, bytes, 2);
    }

    fn putentry(&mut self, offset: usize, label: &str) {
        let Some(section) = self.current_section else {
            return;
        };
        let id = self.obj.add_symbol(Symbol {
            name: label.as_bytes().to_vec(),
            value: self.current_base + offset as u64,
            size: 0,
            kind: SymbolKind::Text,
            scope: SymbolScope::Dynamic,
            weak: false,
            section: SymbolSection::Section(section),
            flags: SymbolFlags::None,
        });
        self.symbols.insert(label.to_string(), id);
    }

    fn putsimpleref(&mut self, label: &str, width: u8, site: usize) {
        self.add_relocation(label, width, site, RelocationKind::Absolute);
    }

    fn putweirdref(&mut self, label: &str, width: u8, site: usize) {
        self.add_relocation(label, width, site, RelocationKind::Relative);
    }
}
