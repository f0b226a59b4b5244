use std::fmt::Write;

use soyjs::{filter_tokens, tokenize_source, ErrorKind, TokenKind};

use similar_asserts::assert_eq;

fn stringify(source: &str) -> String {
    let tokens = tokenize_source(source, "<test>").unwrap();
    let mut rv = String::new();
    for (idx, token) in tokens.iter().enumerate() {
        if idx > 0 {
            rv.push('\n');
        }
        write!(rv, "{:?}", token).unwrap();
    }
    rv
}

#[test]
fn test_token_stream() {
    insta::assert_snapshot!(stringify("{namespace a}\n{template .A}hi{/template}"), @r###"
    Command("namespace", "a") @ 1:0-1:13
    Code("\n") @ 1:13-2:0
    Command("template", ".A") @ 2:0-2:13
    Code("hi") @ 2:13-2:15
    Command(/"template") @ 2:15-2:26
    "###);
}

#[test]
fn test_round_trip() {
    let sources = [
        "",
        "just text",
        "{namespace test.templates}\n\n/**\n * Doc.\n */\n{template .Simple}\n  I am {$name}, {$age} years old.\n{/template}\n",
        "{template .A}{msg desc=\"a {b} c\"}<a href=\"{$url}\">x</a>{/msg}{/template}",
        "{template .A}{literal}{{not}} // parsed{/literal}{/template}",
        "a // comment\nb /* block */ c http://example.com",
    ];
    for source in sources {
        let tokens = tokenize_source(source, "<test>").unwrap();
        let joined: String = tokens.iter().map(|x| x.source).collect();
        assert_eq!(joined, source);
        for pair in tokens.windows(2) {
            assert_eq!(pair[0].span.end_offset, pair[1].span.start_offset);
        }
    }
}

#[test]
fn test_print_shorthand() {
    let tokens = tokenize_source("{$user.name}{print $a + 1}", "<test>").unwrap();
    assert_eq!(tokens.len(), 2);
    for token in &tokens {
        assert_eq!(token.kind, TokenKind::Command);
        assert_eq!(token.command, Some("print"));
        assert!(!token.closing);
    }
    assert_eq!(tokens[0].exp, Some("$user.name"));
    assert_eq!(tokens[1].exp, Some("$a + 1"));
}

#[test]
fn test_filter_keeps_template_content() {
    let source = "// header\n{namespace a}\n\n{template .A}\n  /* inner */ x {nil}\n{/template}\n\n";
    let tokens = tokenize_source(source, "<test>").unwrap();
    let filtered = filter_tokens(&tokens);
    assert!(filtered.iter().all(|x| x.kind != TokenKind::Comment));
    assert!(filtered.iter().all(|x| x.command != Some("nil")));
    assert_eq!(filtered.first().map(|x| x.source), Some("{namespace a}"));
    assert_eq!(filtered.last().map(|x| x.source), Some("{/template}"));
    assert!(filtered.iter().any(|x| x.source == " x "));
}

#[test]
fn test_syntax_errors() {
    for (source, detail) in [
        ("{template .A", "unclosed command, missing `}`"),
        ("{msg desc='x}", "unterminated quoted value in command"),
        ("{}", "empty command"),
        ("{\\x}", "unknown special character command"),
        ("{literal}abc", "unclosed literal block"),
        ("x /* y", "unclosed comment, missing `*/`"),
    ] {
        let err = tokenize_source(source, "broken.soy").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxError, "{}", source);
        assert_eq!(err.detail(), Some(detail), "{}", source);
        assert_eq!(err.name(), Some("broken.soy"));
    }
}

#[test]
fn test_error_line() {
    let err = tokenize_source("{namespace a}\n{template .A}\n  {if $x\n", "<test>").unwrap_err();
    assert_eq!(err.line(), Some(3));
}
