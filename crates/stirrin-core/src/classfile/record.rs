//! Decoded view of one class file.
//!
//! Fields, methods and attributes are kept as raw attribute payloads, so a
//! class that is decoded and re-encoded without changes comes out with the
//! same bytes.

use super::constant_pool::ConstantPool;
use super::mutf8;
use super::{put_u16, put_u32, table_len, ByteReader};

const MAGIC: u32 = 0xCAFE_BABE;
const SIGNATURE_ATTRIBUTE: &str = "Signature";

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_SUPER: u16 = 0x0020;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name: u16,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberInfo {
    pub access: u16,
    pub name: u16,
    pub descriptor: u16,
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Clone, Debug)]
pub struct ClassRecord {
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: ConstantPool,
    pub access: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub attributes: Vec<AttributeInfo>,
}

impl ClassRecord {
    /// An empty public class, version 52 (Java 8).
    pub fn new_class(internal_name: &str, super_name: Option<&str>) -> Result<Self, String> {
        let mut pool = ConstantPool::new();
        let this_class = pool.intern_class(internal_name)?;
        let super_class = match super_name {
            Some(name) => pool.intern_class(name)?,
            None => 0,
        };
        Ok(Self {
            minor_version: 0,
            major_version: 52,
            pool,
            access: ACC_PUBLIC | ACC_SUPER,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        let mut r = ByteReader::new(bytes);
        let magic = r.u32()?;
        if magic != MAGIC {
            return Err(format!("bad magic {magic:#010x}"));
        }
        let minor_version = r.u16()?;
        let major_version = r.u16()?;
        let pool = ConstantPool::decode(&mut r)?;
        let access = r.u16()?;
        let this_class = r.u16()?;
        let super_class = r.u16()?;

        let interface_count = r.u16()?;
        let mut interfaces = Vec::with_capacity(usize::from(interface_count));
        for _ in 0..interface_count {
            interfaces.push(r.u16()?);
        }
        let fields = decode_members(&mut r)?;
        let methods = decode_members(&mut r)?;
        let attributes = decode_attributes(&mut r)?;
        if r.remaining() != 0 {
            return Err(format!("{} trailing bytes after class", r.remaining()));
        }

        let record = Self {
            minor_version,
            major_version,
            pool,
            access,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        };
        record.name()?;
        Ok(record)
    }

    pub fn encode(&self) -> Result<Vec<u8>, String> {
        let mut out = Vec::new();
        put_u32(&mut out, MAGIC);
        put_u16(&mut out, self.minor_version);
        put_u16(&mut out, self.major_version);
        self.pool.encode(&mut out);
        put_u16(&mut out, self.access);
        put_u16(&mut out, self.this_class);
        put_u16(&mut out, self.super_class);
        put_u16(&mut out, table_len(self.interfaces.len(), "interfaces")?);
        for index in &self.interfaces {
            put_u16(&mut out, *index);
        }
        encode_members(&mut out, &self.fields, "fields")?;
        encode_members(&mut out, &self.methods, "methods")?;
        encode_attributes(&mut out, &self.attributes)?;
        Ok(out)
    }

    /// Internal name of this class.
    pub fn name(&self) -> Result<String, String> {
        self.pool
            .class_name(self.this_class)
            .ok_or_else(|| format!("this_class {} is not a class constant", self.this_class))
    }

    pub fn super_name(&self) -> Option<String> {
        if self.super_class == 0 {
            return None;
        }
        self.pool.class_name(self.super_class)
    }

    pub fn interface_names(&self) -> Vec<String> {
        self.interfaces
            .iter()
            .filter_map(|i| self.pool.class_name(*i))
            .collect()
    }

    pub fn has_interface(&self, internal_name: &str) -> bool {
        self.interface_names().iter().any(|n| n == internal_name)
    }

    pub fn add_interface(&mut self, internal_name: &str) -> Result<(), String> {
        let index = self.pool.intern_class(internal_name)?;
        self.interfaces.push(index);
        Ok(())
    }

    /// The class-level generic signature, if the class carries one.
    pub fn signature(&self) -> Option<String> {
        let attribute = self.find_attribute(SIGNATURE_ATTRIBUTE)?;
        let data = &self.attributes[attribute].data;
        if data.len() != 2 {
            return None;
        }
        self.pool.utf8(u16::from_be_bytes([data[0], data[1]]))
    }

    /// Replace the class-level generic signature, adding the attribute when
    /// the class has none.
    pub fn set_signature(&mut self, signature: &str) -> Result<(), String> {
        let value = self.pool.intern_utf8(signature)?;
        let data = value.to_be_bytes().to_vec();
        match self.find_attribute(SIGNATURE_ATTRIBUTE) {
            Some(i) => self.attributes[i].data = data,
            None => {
                let name = self.pool.intern_utf8(SIGNATURE_ATTRIBUTE)?;
                self.attributes.push(AttributeInfo { name, data });
            }
        }
        Ok(())
    }

    /// Compares encoded bytes, so methods whose names do not decode still
    /// take part.
    pub fn has_method(&self, name: &str, descriptor: &str) -> bool {
        let name = mutf8::encode(name);
        let descriptor = mutf8::encode(descriptor);
        self.methods.iter().any(|m| {
            self.pool.utf8_bytes(m.name) == Some(name.as_slice())
                && self.pool.utf8_bytes(m.descriptor) == Some(descriptor.as_slice())
        })
    }

    /// `(name, descriptor)` of every method as raw modified UTF-8 bytes.
    pub fn method_keys(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, String> {
        self.methods
            .iter()
            .map(|m| {
                let name = self.pool.utf8_bytes(m.name);
                let descriptor = self.pool.utf8_bytes(m.descriptor);
                match (name, descriptor) {
                    (Some(n), Some(d)) => Ok((n.to_vec(), d.to_vec())),
                    _ => Err(format!(
                        "method name {} or descriptor {} is not a Utf8 constant",
                        m.name, m.descriptor
                    )),
                }
            })
            .collect()
    }

    pub fn add_method(
        &mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        attributes: Vec<AttributeInfo>,
    ) -> Result<(), String> {
        let name = self.pool.intern_utf8(name)?;
        let descriptor = self.pool.intern_utf8(descriptor)?;
        self.methods.push(MemberInfo {
            access,
            name,
            descriptor,
            attributes,
        });
        Ok(())
    }

    fn find_attribute(&self, name: &str) -> Option<usize> {
        self.attributes
            .iter()
            .position(|a| self.pool.utf8(a.name).as_deref() == Some(name))
    }
}

fn decode_members(r: &mut ByteReader<'_>) -> Result<Vec<MemberInfo>, String> {
    let count = r.u16()?;
    let mut members = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        members.push(MemberInfo {
            access: r.u16()?,
            name: r.u16()?,
            descriptor: r.u16()?,
            attributes: decode_attributes(r)?,
        });
    }
    Ok(members)
}

fn decode_attributes(r: &mut ByteReader<'_>) -> Result<Vec<AttributeInfo>, String> {
    let count = r.u16()?;
    let mut attributes = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let name = r.u16()?;
        let len = usize::try_from(r.u32()?).map_err(|e| e.to_string())?;
        attributes.push(AttributeInfo {
            name,
            data: r.take(len)?.to_vec(),
        });
    }
    Ok(attributes)
}

fn encode_members(out: &mut Vec<u8>, members: &[MemberInfo], what: &str) -> Result<(), String> {
    put_u16(out, table_len(members.len(), what)?);
    for member in members {
        put_u16(out, member.access);
        put_u16(out, member.name);
        put_u16(out, member.descriptor);
        encode_attributes(out, &member.attributes)?;
    }
    Ok(())
}

fn encode_attributes(out: &mut Vec<u8>, attributes: &[AttributeInfo]) -> Result<(), String> {
    put_u16(out, table_len(attributes.len(), "attributes")?);
    for attribute in attributes {
        put_u16(out, attribute.name);
        let len = u32::try_from(attribute.data.len()).map_err(|e| e.to_string())?;
        put_u32(out, len);
        out.extend_from_slice(&attribute.data);
    }
    Ok(())
}
