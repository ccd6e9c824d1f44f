//! Constant pool decoding, encoding and interning.

use std::collections::HashMap;

use super::{mutf8, put_u16, put_u32, ByteReader};

/// One constant pool entry. Strings are kept as their raw modified UTF-8
/// bytes so unchanged entries re-encode identically.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Constant {
    Utf8(Vec<u8>),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class(u16),
    String(u16),
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType(u16),
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module(u16),
    Package(u16),
}

impl Constant {
    fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConstantPool {
    /// Slot 0 and the slot after each wide constant are `None`.
    entries: Vec<Option<Constant>>,
    lookup: HashMap<Constant, u16>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self {
            entries: vec![None],
            lookup: HashMap::new(),
        }
    }

    pub(crate) fn decode(r: &mut ByteReader<'_>) -> Result<Self, String> {
        let count = r.u16()?;
        if count == 0 {
            return Err("constant pool count is zero".to_string());
        }
        let mut pool = ConstantPool {
            entries: Vec::with_capacity(usize::from(count)),
            lookup: HashMap::new(),
        };
        pool.entries.push(None);
        while pool.entries.len() < usize::from(count) {
            let index = pool.entries.len();
            let tag = r.u8()?;
            let constant = match tag {
                1 => {
                    let len = usize::from(r.u16()?);
                    Constant::Utf8(r.take(len)?.to_vec())
                }
                3 => Constant::Integer(r.u32()?),
                4 => Constant::Float(r.u32()?),
                5 => Constant::Long(r.u64()?),
                6 => Constant::Double(r.u64()?),
                7 => Constant::Class(r.u16()?),
                8 => Constant::String(r.u16()?),
                9 => Constant::FieldRef {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                10 => Constant::MethodRef {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                11 => Constant::InterfaceMethodRef {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                12 => Constant::NameAndType {
                    name: r.u16()?,
                    descriptor: r.u16()?,
                },
                15 => Constant::MethodHandle {
                    kind: r.u8()?,
                    reference: r.u16()?,
                },
                16 => Constant::MethodType(r.u16()?),
                17 => Constant::Dynamic {
                    bootstrap: r.u16()?,
                    name_and_type: r.u16()?,
                },
                18 => Constant::InvokeDynamic {
                    bootstrap: r.u16()?,
                    name_and_type: r.u16()?,
                },
                19 => Constant::Module(r.u16()?),
                20 => Constant::Package(r.u16()?),
                other => return Err(format!("unknown constant tag {other} at index {index}")),
            };
            let wide = constant.is_wide();
            // Index fits: the loop is bounded by a u16 count.
            pool.lookup.entry(constant.clone()).or_insert(index as u16);
            pool.entries.push(Some(constant));
            if wide {
                pool.entries.push(None);
            }
        }
        if pool.entries.len() != usize::from(count) {
            return Err("wide constant overruns the constant pool".to_string());
        }
        Ok(pool)
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        // `intern` keeps the length within u16.
        put_u16(out, self.entries.len() as u16);
        for constant in self.entries.iter().flatten() {
            match constant {
                Constant::Utf8(bytes) => {
                    out.push(1);
                    put_u16(out, bytes.len() as u16);
                    out.extend_from_slice(bytes);
                }
                Constant::Integer(v) => {
                    out.push(3);
                    put_u32(out, *v);
                }
                Constant::Float(v) => {
                    out.push(4);
                    put_u32(out, *v);
                }
                Constant::Long(v) => {
                    out.push(5);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Double(v) => {
                    out.push(6);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Class(i) => {
                    out.push(7);
                    put_u16(out, *i);
                }
                Constant::String(i) => {
                    out.push(8);
                    put_u16(out, *i);
                }
                Constant::FieldRef { class, name_and_type } => {
                    out.push(9);
                    put_u16(out, *class);
                    put_u16(out, *name_and_type);
                }
                Constant::MethodRef { class, name_and_type } => {
                    out.push(10);
                    put_u16(out, *class);
                    put_u16(out, *name_and_type);
                }
                Constant::InterfaceMethodRef { class, name_and_type } => {
                    out.push(11);
                    put_u16(out, *class);
                    put_u16(out, *name_and_type);
                }
                Constant::NameAndType { name, descriptor } => {
                    out.push(12);
                    put_u16(out, *name);
                    put_u16(out, *descriptor);
                }
                Constant::MethodHandle { kind, reference } => {
                    out.push(15);
                    out.push(*kind);
                    put_u16(out, *reference);
                }
                Constant::MethodType(i) => {
                    out.push(16);
                    put_u16(out, *i);
                }
                Constant::Dynamic {
                    bootstrap,
                    name_and_type,
                } => {
                    out.push(17);
                    put_u16(out, *bootstrap);
                    put_u16(out, *name_and_type);
                }
                Constant::InvokeDynamic {
                    bootstrap,
                    name_and_type,
                } => {
                    out.push(18);
                    put_u16(out, *bootstrap);
                    put_u16(out, *name_and_type);
                }
                Constant::Module(i) => {
                    out.push(19);
                    put_u16(out, *i);
                }
                Constant::Package(i) => {
                    out.push(20);
                    put_u16(out, *i);
                }
            }
        }
    }

    /// Number of slots, including the unused slot 0.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.entries.get(usize::from(index)).and_then(Option::as_ref)
    }

    pub fn utf8(&self, index: u16) -> Option<String> {
        match self.get(index)? {
            Constant::Utf8(bytes) => mutf8::decode(bytes).ok(),
            _ => None,
        }
    }

    /// Raw modified UTF-8 bytes of the `Utf8` constant at `index`.
    pub fn utf8_bytes(&self, index: u16) -> Option<&[u8]> {
        match self.get(index)? {
            Constant::Utf8(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Internal name held by the `Class` constant at `index`.
    pub fn class_name(&self, index: u16) -> Option<String> {
        match self.get(index)? {
            Constant::Class(name) => self.utf8(*name),
            _ => None,
        }
    }

    /// Index of `constant`, adding it when absent.
    pub fn intern(&mut self, constant: Constant) -> Result<u16, String> {
        if let Some(&index) = self.lookup.get(&constant) {
            return Ok(index);
        }
        let slots = if constant.is_wide() { 2 } else { 1 };
        let index = self.entries.len();
        if index + slots > usize::from(u16::MAX) {
            return Err("constant pool is full".to_string());
        }
        let wide = constant.is_wide();
        self.lookup.insert(constant.clone(), index as u16);
        self.entries.push(Some(constant));
        if wide {
            self.entries.push(None);
        }
        Ok(index as u16)
    }

    pub fn intern_utf8(&mut self, text: &str) -> Result<u16, String> {
        let bytes = mutf8::encode(text);
        if bytes.len() > usize::from(u16::MAX) {
            return Err(format!("string constant too long ({} bytes)", bytes.len()));
        }
        self.intern(Constant::Utf8(bytes))
    }

    pub fn intern_class(&mut self, internal_name: &str) -> Result<u16, String> {
        let name = self.intern_utf8(internal_name)?;
        self.intern(Constant::Class(name))
    }

    pub fn intern_string(&mut self, text: &str) -> Result<u16, String> {
        let utf8 = self.intern_utf8(text)?;
        self.intern(Constant::String(utf8))
    }

    pub fn intern_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> Result<u16, String> {
        let class = self.intern_class(class)?;
        let name = self.intern_utf8(name)?;
        let descriptor = self.intern_utf8(descriptor)?;
        let name_and_type = self.intern(Constant::NameAndType { name, descriptor })?;
        self.intern(Constant::MethodRef {
            class,
            name_and_type,
        })
    }
}
