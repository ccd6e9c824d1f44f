//! Stub methods: public methods whose body throws, marked so they can be
//! found and removed before the real mixin is applied.

use crate::models::MethodSignature;
use crate::signature;

use super::record::{AttributeInfo, ClassRecord, ACC_PUBLIC};
use super::{put_u16, put_u32};

/// Descriptor of the annotation placed on every stub.
pub const STUB_ANNOTATION: &str = "Lio/github/opencubicchunks/stirrin/StirrinStub;";

pub const STUB_MESSAGE: &str = "This stub should only exist in a dev environment. \
If this exception is thrown stubs were not removed before mixin applied!";

const EXCEPTION_CLASS: &str = "java/lang/RuntimeException";
const EXCEPTION_INIT: &str = "(Ljava/lang/String;)V";
const MAX_STACK: u16 = 3;

// Opcodes.
const NEW: u8 = 0xBB;
const DUP: u8 = 0x59;
const LDC: u8 = 0x12;
const LDC_W: u8 = 0x13;
const INVOKESPECIAL: u8 = 0xB7;
const ATHROW: u8 = 0xBF;

/// Append a stub implementing `method` to `record`.
pub fn add_stub(record: &mut ClassRecord, method: &MethodSignature) -> Result<(), String> {
    let (parameter_count, parameter_slots) =
        signature::parameter_layout(&method.descriptor).map_err(|e| e.to_string())?;

    let mut attributes = Vec::with_capacity(5);
    attributes.push(code_attribute(record, parameter_slots)?);

    if !method.thrown_exceptions.is_empty() {
        let mut data = Vec::new();
        put_u16(
            &mut data,
            super::table_len(method.thrown_exceptions.len(), "exceptions")?,
        );
        for thrown in &method.thrown_exceptions {
            let index = record.pool.intern_class(thrown)?;
            put_u16(&mut data, index);
        }
        attributes.push(attribute(record, "Exceptions", data)?);
    }

    if let Some(generic) = &method.generic_signature {
        let index = record.pool.intern_utf8(generic)?;
        attributes.push(attribute(record, "Signature", index.to_be_bytes().to_vec())?);
    }

    let names = method.parameter_names_or_default(parameter_count);
    let count = u8::try_from(names.len()).map_err(|_| "too many parameters".to_string())?;
    let mut data = vec![count];
    for name in &names {
        let index = record.pool.intern_utf8(name)?;
        put_u16(&mut data, index);
        put_u16(&mut data, 0);
    }
    attributes.push(attribute(record, "MethodParameters", data)?);

    let annotation_type = record.pool.intern_utf8(STUB_ANNOTATION)?;
    let mut data = Vec::new();
    put_u16(&mut data, 1);
    put_u16(&mut data, annotation_type);
    put_u16(&mut data, 0);
    attributes.push(attribute(record, "RuntimeVisibleAnnotations", data)?);

    record.add_method(ACC_PUBLIC, &method.name, &method.descriptor, attributes)
}

fn attribute(record: &mut ClassRecord, name: &str, data: Vec<u8>) -> Result<AttributeInfo, String> {
    Ok(AttributeInfo {
        name: record.pool.intern_utf8(name)?,
        data,
    })
}

/// `new RuntimeException; dup; ldc msg; invokespecial <init>; athrow`
fn code_attribute(record: &mut ClassRecord, parameter_slots: u16) -> Result<AttributeInfo, String> {
    let exception = record.pool.intern_class(EXCEPTION_CLASS)?;
    let message = record.pool.intern_string(STUB_MESSAGE)?;
    let init = record
        .pool
        .intern_method_ref(EXCEPTION_CLASS, "<init>", EXCEPTION_INIT)?;

    let mut code = Vec::with_capacity(12);
    code.push(NEW);
    put_u16(&mut code, exception);
    code.push(DUP);
    match u8::try_from(message) {
        Ok(index) => code.extend_from_slice(&[LDC, index]),
        Err(_) => {
            code.push(LDC_W);
            put_u16(&mut code, message);
        }
    }
    code.push(INVOKESPECIAL);
    put_u16(&mut code, init);
    code.push(ATHROW);

    let max_locals = parameter_slots
        .checked_add(1)
        .ok_or_else(|| "too many parameter slots".to_string())?;
    let mut data = Vec::with_capacity(12 + code.len());
    put_u16(&mut data, MAX_STACK);
    put_u16(&mut data, max_locals);
    put_u32(&mut data, code.len() as u32);
    data.extend_from_slice(&code);
    put_u16(&mut data, 0); // exception table
    put_u16(&mut data, 0); // attributes
    attribute(record, "Code", data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::constant_pool::Constant;
    use std::collections::BTreeSet;

    fn method(name: &str, descriptor: &str) -> MethodSignature {
        MethodSignature {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            generic_signature: None,
            parameter_names: None,
            type_parameters: BTreeSet::new(),
            thrown_exceptions: Vec::new(),
        }
    }

    fn attribute_named<'a>(record: &ClassRecord, attrs: &'a [AttributeInfo], name: &str) -> Option<&'a AttributeInfo> {
        attrs
            .iter()
            .find(|a| record.pool.utf8(a.name).as_deref() == Some(name))
    }

    #[test]
    fn test_stub_code_and_marker() {
        let mut record = ClassRecord::new_class("pkg/Foo", Some("java/lang/Object")).unwrap();
        add_stub(&mut record, &method("get", "()I")).unwrap();
        let stub = &record.methods[0];
        assert_eq!(stub.access, ACC_PUBLIC);
        assert!(record.has_method("get", "()I"));

        let code = attribute_named(&record, &stub.attributes, "Code").unwrap();
        assert_eq!(&code.data[..4], &[0, 3, 0, 1]);
        let body = &code.data[8..code.data.len() - 4];
        assert_eq!(body[0], NEW);
        assert_eq!(body[3], DUP);
        assert_eq!(body[4], LDC);
        assert_eq!(*body.last().unwrap(), ATHROW);
        match record.pool.get(u16::from(body[5])) {
            Some(Constant::String(utf8)) => {
                assert_eq!(record.pool.utf8(*utf8).as_deref(), Some(STUB_MESSAGE))
            }
            other => panic!("expected string constant, got {other:?}"),
        }

        let annotations = attribute_named(&record, &stub.attributes, "RuntimeVisibleAnnotations").unwrap();
        let type_index = u16::from_be_bytes([annotations.data[2], annotations.data[3]]);
        assert_eq!(record.pool.utf8(type_index).as_deref(), Some(STUB_ANNOTATION));
        assert!(attribute_named(&record, &stub.attributes, "Signature").is_none());
        assert!(attribute_named(&record, &stub.attributes, "Exceptions").is_none());
    }

    #[test]
    fn test_locals_count_wide_parameters() {
        let mut record = ClassRecord::new_class("pkg/Foo", None).unwrap();
        add_stub(&mut record, &method("set", "(JLjava/lang/String;D)V")).unwrap();
        let code = attribute_named(&record, &record.methods[0].attributes, "Code").unwrap();
        assert_eq!(u16::from_be_bytes([code.data[2], code.data[3]]), 1 + 2 + 1 + 2);

        let params = attribute_named(&record, &record.methods[0].attributes, "MethodParameters").unwrap();
        assert_eq!(params.data[0], 3);
        let first = u16::from_be_bytes([params.data[1], params.data[2]]);
        assert_eq!(record.pool.utf8(first).as_deref(), Some("arg0"));
    }

    #[test]
    fn test_signature_and_exceptions() {
        let mut record = ClassRecord::new_class("pkg/Foo", None).unwrap();
        let mut m = method("wrap", "(Ljava/lang/Number;)V");
        m.generic_signature = Some("<T:Ljava/lang/Number;>(TT;)V".to_string());
        m.thrown_exceptions = vec!["java/io/IOException".to_string()];
        m.parameter_names = Some(vec!["value".to_string()]);
        add_stub(&mut record, &m).unwrap();

        let attrs = &record.methods[0].attributes;
        let sig = attribute_named(&record, attrs, "Signature").unwrap();
        let sig_index = u16::from_be_bytes([sig.data[0], sig.data[1]]);
        assert_eq!(
            record.pool.utf8(sig_index).as_deref(),
            Some("<T:Ljava/lang/Number;>(TT;)V")
        );
        let exceptions = attribute_named(&record, attrs, "Exceptions").unwrap();
        let class_index = u16::from_be_bytes([exceptions.data[2], exceptions.data[3]]);
        assert_eq!(record.pool.class_name(class_index).as_deref(), Some("java/io/IOException"));
    }

    #[test]
    fn test_ldc_w_for_high_constant_index() {
        let mut record = ClassRecord::new_class("pkg/Foo", None).unwrap();
        for i in 0..300 {
            record.pool.intern(Constant::Integer(i)).unwrap();
        }
        add_stub(&mut record, &method("get", "()I")).unwrap();
        let code = attribute_named(&record, &record.methods[0].attributes, "Code").unwrap();
        let body = &code.data[8..code.data.len() - 4];
        assert_eq!(body[4], LDC_W);
        assert_eq!(body.len(), 11);
    }

    #[test]
    fn test_stubbed_class_round_trips() {
        let mut record = ClassRecord::new_class("pkg/Foo", Some("java/lang/Object")).unwrap();
        add_stub(&mut record, &method("get", "()I")).unwrap();
        let bytes = record.encode().unwrap();
        let decoded = ClassRecord::decode(&bytes).unwrap();
        assert_eq!(decoded.method_keys().unwrap(), vec![(b"get".to_vec(), b"()I".to_vec())]);
    }
}
