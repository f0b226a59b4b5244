#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    template: String,
    name: String,
    count: i64,
}

fuzz_target!(|input: Input| {
    let compiler = soyjs::Compiler::new();
    let source = format!("{{namespace fuzz}}{{template .T}}{}{{/template}}", input.template);
    if let Ok(unit) = compiler.compile_unit_from_source(&source, "fuzz.soy") {
        let data = serde_json::json!({"name": input.name, "count": input.count});
        unit.render(".T", &data).ok();
    }
});
