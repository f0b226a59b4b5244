use soyjs::machinery::ast::{Fragment, Stmt};
use soyjs::machinery::parse;
use soyjs::{
    create_msg_from_tokens, filter_tokens, get_variable_name, parse_command_attributes,
    tokenize_source, Compiler, ErrorKind, Span, Token,
};

use similar_asserts::assert_eq;

fn command<'s>(source: &'s str, command: &'s str, closing: bool, exp: Option<&'s str>) -> Token<'s> {
    Token::command(source, command, closing, exp, Span::default())
}

fn code(source: &str) -> Token<'_> {
    Token::code(source, Span::default())
}

#[test]
fn test_parse_command_attributes() {
    let token = command(
        r#"{msg meaning="test" desc="Lorem ipsum."}"#,
        "msg",
        false,
        Some(r#"meaning="test" desc="Lorem ipsum.""#),
    );
    let attrs = parse_command_attributes(&token).unwrap();
    assert_eq!(attrs.len(), 2);
    assert_eq!(attrs.get("meaning"), Some("test"));
    assert_eq!(attrs.get("desc"), Some("Lorem ipsum."));
}

#[test]
fn test_parse_empty_attributes() {
    let attrs = parse_command_attributes(&command("{msg}", "msg", false, None)).unwrap();
    assert_eq!(attrs.len(), 0);
    assert!(attrs.is_empty());
}

#[test]
fn test_parse_attributes_of_template() {
    let token = command(
        "{template .Foo autoescape=\"false\" private='true'}",
        "template",
        false,
        Some(".Foo autoescape=\"false\" private='true'"),
    );
    let attrs = parse_command_attributes(&token).unwrap();
    assert_eq!(
        attrs.iter().collect::<Vec<_>>(),
        vec![("autoescape", "false"), ("private", "true")]
    );
}

#[test]
fn test_get_variable_name() {
    assert_eq!(get_variable_name("$name").as_deref(), Some("name"));
    assert_eq!(
        get_variable_name("$message_description").as_deref(),
        Some("messageDescription")
    );
    assert_eq!(
        get_variable_name("$_description").as_deref(),
        Some("_description")
    );
    assert_eq!(
        get_variable_name("$description_").as_deref(),
        Some("description_")
    );
    assert_eq!(get_variable_name("$name && $surname"), None);
}

#[test]
fn test_create_msg() {
    let tokens = [
        command(
            r#"{msg meaning="intro" desc="Introduction"}"#,
            "msg",
            false,
            Some(r#"meaning="intro" desc="Introduction""#),
        ),
        code("I am "),
        command("{print $name}", "print", false, Some("$name")),
        code(", "),
        command("{print $age}", "print", false, Some("$age")),
        code(r##" years old. Check out my <a href="#">profile</a>."##),
        command("{/msg}", "msg", true, None),
    ];
    let msg = create_msg_from_tokens(&tokens).unwrap();
    assert_eq!(
        msg.text,
        "I am {$name}, {$age} years old. Check out my {$startLink}profile{$endLink}."
    );
    assert_eq!(msg.meaning.as_deref(), Some("intro"));
    assert_eq!(msg.desc.as_deref(), Some("Introduction"));

    let names: Vec<_> = msg.placeholders.iter().map(|x| x.name.as_str()).collect();
    assert_eq!(names, vec!["name", "age", "startLink", "endLink"]);
    assert_eq!(
        msg.placeholder("startLink").map(|x| x.value.clone()),
        Some(vec![Fragment::Text(r##"<a href="#">"##.into())])
    );
    assert!(matches!(
        msg.placeholder("name").map(|x| &x.value[..]),
        Some([Fragment::Expr(_)])
    ));
}

#[test]
fn test_create_msg_rejects_non_msg() {
    let err = create_msg_from_tokens(&[code("hello")]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CompileError);
}

#[test]
fn test_conditional_structure() {
    let source = "{namespace a}{template .A}{if $a}1{elseif $b}2{elseif $c}3{else}4{/if}{/template}";
    let tokens = filter_tokens(&tokenize_source(source, "<test>").unwrap());
    let unit = parse(&tokens).unwrap();
    assert_eq!(unit.namespace, Some("a"));
    assert_eq!(unit.templates.len(), 1);
    match &unit.templates[0].body[..] {
        [Stmt::IfCond(cond)] => {
            assert_eq!(cond.branches.len(), 3);
            assert!(cond.else_body.is_some());
        }
        other => panic!("unexpected body: {:?}", other),
    }
}

#[test]
fn test_compile_tokens() {
    let source = "{namespace test.templates}\n\n{template .ElseIf}\n  {if $gender == 'm'}\n    boy\n  {elseif $gender == 'f'}\n    girl\n  {/if}\n{/template}\n";
    let tokens = filter_tokens(&tokenize_source(source, "elseif.soy").unwrap());
    let js = Compiler::new().compile_tokens(&tokens).unwrap();
    insta::assert_snapshot!(js, @r###"
    goog.provide('test.templates');

    goog.require('soy');

    /**
     * @param {Object<string, *>=} opt_data
     * @return {string}
     */
    test.templates.ElseIf = function(opt_data) {
      opt_data = opt_data || {};
      var output = '';
      if (opt_data.gender == 'm') {
        output += 'boy';
      } else if (opt_data.gender == 'f') {
        output += 'girl';
      }
      return output;
    };
    "###);
}

#[test]
fn test_compile_errors() {
    let compiler = Compiler::new();
    for (source, detail) in [
        ("hello", "text outside of template"),
        ("{template .A}{/template}", "template `.A` needs a namespace declaration"),
        ("{namespace a}{template .A}{if $x}{/template}", "unexpected `/template`, expected `/if`"),
        ("{namespace a}{template .A}{else}{/template}", "`else` outside of `if` block"),
        ("{namespace a}{template .A}{msg}{if $x}{/if}{/msg}{/template}", "command `if` is not allowed in msg"),
        ("{namespace a}{template .A}{foo}{/template}", "unknown command `foo`"),
    ] {
        let err = compiler.compile_source(source, "broken.soy").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CompileError, "{}", source);
        assert_eq!(err.detail(), Some(detail), "{}", source);
        assert_eq!(err.name(), Some("broken.soy"));
    }
}
