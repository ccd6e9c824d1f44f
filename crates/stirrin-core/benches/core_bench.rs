//! Criterion benchmarks for stirrin-core.
//!
//! ## Benchmark groups
//!
//! 1. **signature**: descriptor and generic-signature synthesis.
//! 2. **source**: Java parsing plus interface method extraction.
//! 3. **classfile**: class decoding and augmentation with stubs.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/stirrin-core/Cargo.toml
//! # Run only the classfile group:
//! cargo bench --manifest-path crates/stirrin-core/Cargo.toml -- classfile
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use stirrin_core::archive::augment_class;
use stirrin_core::classfile::record::ACC_PUBLIC;
use stirrin_core::classfile::ClassRecord;
use stirrin_core::models::{
    MethodSignature, PrimitiveType, ResolvedType, TargetPlan, TypeArgument, TypeParameter,
};
use stirrin_core::signature::{method_descriptor, method_signature, type_signature};
use stirrin_core::source::filesystem::SourceRoots;
use stirrin_core::source::interfaces::extract_from_unit;
use stirrin_core::source::parser::parse_java_source;
use stirrin_core::source::resolver::{ClassPath, NameResolver, ResolutionCache};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// An interface with `n` contract methods of mixed shapes.
fn interface_source(n: usize) -> String {
    let mut src = String::from(
        "package bench;\n\nimport java.util.List;\nimport java.util.Map;\n\npublic interface IWide {\n",
    );
    for i in 0..n {
        match i % 4 {
            0 => src.push_str(&format!("    int get{i}();\n")),
            1 => src.push_str(&format!("    void set{i}(long value, String name);\n")),
            2 => src.push_str(&format!(
                "    <T extends Number> List<T> list{i}(Map<String, T> source, T[][] grid);\n"
            )),
            _ => src.push_str(&format!(
                "    String[] names{i}(int... ids) throws java.io.IOException;\n"
            )),
        }
    }
    src.push_str("}\n");
    src
}

fn methods(n: usize) -> Vec<MethodSignature> {
    (0..n)
        .map(|i| MethodSignature {
            name: format!("m{i}"),
            descriptor: if i % 2 == 0 {
                "()I".to_string()
            } else {
                "(JLjava/lang/String;)V".to_string()
            },
            generic_signature: None,
            parameter_names: None,
            type_parameters: BTreeSet::new(),
            thrown_exceptions: Vec::new(),
        })
        .collect()
}

fn plan(n: usize) -> TargetPlan {
    let mut plan = TargetPlan::default();
    plan.interfaces.insert("bench.IWide".to_string());
    plan.methods.insert("bench.IWide".to_string(), methods(n));
    plan
}

fn target_class_bytes(existing: usize) -> Vec<u8> {
    let mut record = ClassRecord::new_class("bench/Target", Some("java/lang/Object")).unwrap();
    for i in 0..existing {
        record
            .add_method(ACC_PUBLIC, &format!("own{i}"), "()V", Vec::new())
            .unwrap();
    }
    record.encode().unwrap()
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_signature(c: &mut Criterion) {
    let mut group = c.benchmark_group("signature");

    let t = TypeParameter {
        name: "T".to_string(),
        bounds: vec![ResolvedType::class("java.lang.Number")],
    };
    let list_of_t = ResolvedType::Parameterized {
        class: "java.util.List".to_string(),
        arguments: vec![TypeArgument::Type(ResolvedType::TypeVariable("T".to_string()))],
    };
    let params = vec![
        ResolvedType::Primitive(PrimitiveType::Int),
        ResolvedType::array(3, ResolvedType::class("java.lang.String")),
        list_of_t.clone(),
    ];
    let ret = ResolvedType::Primitive(PrimitiveType::Void);
    let scope = vec![t];

    group.bench_function("method_descriptor", |b| {
        b.iter(|| method_descriptor(black_box(&params), black_box(&ret), black_box(&scope)))
    });
    group.bench_function("method_signature", |b| {
        b.iter(|| method_signature(black_box(&scope), black_box(&params), black_box(&ret), &[]))
    });
    group.bench_function("type_signature_parameterized", |b| {
        b.iter(|| type_signature(black_box(&list_of_t)))
    });

    group.finish();
}

fn bench_source(c: &mut Criterion) {
    let mut group = c.benchmark_group("source");
    let roots = SourceRoots::new(Vec::<PathBuf>::new());
    let class_path = ClassPath::new(Vec::new());
    let names = vec!["bench.IWide".to_string()];

    for n in [8usize, 64, 256] {
        let source = interface_source(n);
        group.bench_with_input(BenchmarkId::new("parse_and_extract", n), &source, |b, src| {
            b.iter(|| {
                let cache = ResolutionCache::new();
                let resolver = NameResolver::new(&roots, &class_path, &cache);
                let unit = parse_java_source(Path::new("IWide.java"), src.clone()).unwrap();
                black_box(extract_from_unit(&unit, &names, resolver).unwrap());
            })
        });
    }

    group.finish();
}

fn bench_classfile(c: &mut Criterion) {
    let mut group = c.benchmark_group("classfile");

    for n in [4usize, 32, 128] {
        let bytes = target_class_bytes(n);
        let plan = plan(n);
        group.bench_with_input(BenchmarkId::new("decode_augment_encode", n), &bytes, |b, bytes| {
            b.iter(|| {
                let mut record = ClassRecord::decode(bytes).unwrap();
                let changes = augment_class(&mut record, &plan).unwrap();
                black_box(changes);
                black_box(record.encode().unwrap());
            })
        });
    }

    let bytes = target_class_bytes(64);
    group.bench_function("decode_encode_unchanged", |b| {
        b.iter(|| {
            let record = ClassRecord::decode(black_box(&bytes)).unwrap();
            black_box(record.encode().unwrap());
        })
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Register all benchmark groups
// ---------------------------------------------------------------------------

criterion_group!(benches, bench_signature, bench_source, bench_classfile);
criterion_main!(benches);
