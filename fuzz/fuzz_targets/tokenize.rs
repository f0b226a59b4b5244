#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: &str| {
    if let Ok(tokens) = soyjs::tokenize_source(input, "fuzz.soy") {
        let joined: String = tokens.iter().map(|x| x.source).collect();
        assert_eq!(joined, input);
        soyjs::Compiler::new()
            .compile_tokens(&soyjs::filter_tokens(&tokens))
            .ok();
    }
});
