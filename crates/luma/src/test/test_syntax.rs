// Front end: literals, parse-time validation, error positions.

use super::{check, run};
use crate::ErrorKind;

#[track_caller]
fn check_syntax_error(source: &str) -> String {
    let err = run(source).unwrap_err();
    assert_eq!(err.kind, ErrorKind::SyntaxError, "in: {}", source);
    err.message
}

#[test]
fn number_literals() {
    check(
        r#"
        assert(255 == 0xFF)
        assert(0xff == 0xFF)
        assert(1e3 == 1000.0)
        assert(1.5e-1 == 0.15)
        assert(.5 == 0.5)
        assert(math.type(3) == "integer")
        assert(math.type(3.) == "float")
        -- decimal overflow demotes to float
        assert(math.type(99999999999999999999) == "float")
        -- hex wraps
        assert(0xFFFFFFFFFFFFFFFF == -1)
    "#,
    );
}

#[test]
fn string_literals_and_escapes() {
    check(
        r#"
        assert(#"\n" == 1)
        assert("\x41" == "A")
        assert("\65" == "A")
        assert("\097" == "a")
        assert("a\tb" ~= "a b")
        assert('single' == "single")
        assert("quote\"inside" == 'quote"inside')
        local long = [[line
content]]
        assert(#long == 12)
        assert([==[nested ]] ok]==] == "nested ]] ok")
        local skipped = "a\z
                         b"
        assert(skipped == "ab")
    "#,
    );
}

#[test]
fn comments_are_ignored() {
    check(
        r#"
        -- line comment
        local a = 1 -- trailing
        --[[ long
             comment ]]
        local b = 2
        --[==[ level two ]==]
        assert(a + b == 3)
    "#,
    );
}

#[test]
fn method_definitions_desugar_self() {
    check(
        r#"
        local account = {balance = 0}
        function account:deposit(n)
            self.balance = self.balance + n
        end
        account:deposit(10)
        account:deposit(5)
        assert(account.balance == 15)

        local nested = {inner = {}}
        function nested.inner.helper() return "ok" end
        assert(nested.inner.helper() == "ok")
    "#,
    );
}

#[test]
fn unbalanced_blocks_fail() {
    check_syntax_error("if true then");
    check_syntax_error("do");
    check_syntax_error("local x = ");
    check_syntax_error("return return");
    check_syntax_error("f(");
}

#[test]
fn break_outside_loop_is_rejected() {
    let msg = check_syntax_error("break");
    assert!(msg.contains("break"));
}

#[test]
fn vararg_outside_vararg_function_is_rejected() {
    let msg = check_syntax_error("local f = function() return ... end");
    assert!(msg.contains("..."));
    // the main chunk itself is vararg
    check("local count = select('#', ...) assert(count == 0)");
}

#[test]
fn goto_validation() {
    let msg = check_syntax_error("goto nowhere");
    assert!(msg.contains("nowhere"));
    // jumping into a local's scope
    let msg = check_syntax_error(
        r#"
        do
            goto skip
            local trapped = 1
            trapped = trapped + 1
            ::skip::
            print(trapped)
        end
    "#,
    );
    assert!(msg.contains("trapped"));
    // a label in the void tail is fine even after locals
    check(
        r#"
        do
            goto fin
            local unused = 1
            ::fin::
        end
    "#,
    );
}

#[test]
fn unknown_attribute_is_rejected() {
    let msg = check_syntax_error("local x <shiny> = 1");
    assert!(msg.contains("shiny"));
}

#[test]
fn error_positions_point_at_the_line() {
    let err = run("local a = 1\nlocal b = 2\nreturn a +\n").unwrap_err();
    assert_eq!(err.kind, ErrorKind::SyntaxError);
    assert!(err.message.starts_with('4') || err.message.contains(":4") || err.message.contains("4:"),
        "unexpected position in: {}", err.message);
}

#[test]
fn call_syntax_sugar() {
    check(
        r#"
        local function tag(arg) return arg end
        -- string and table arguments call without parentheses
        assert(tag"direct" == "direct")
        local t = tag{1, 2}
        assert(#t == 2)
    "#,
    );
}

#[test]
fn semicolons_are_statement_separators() {
    check("local a = 1; local b = 2; assert(a + b == 3);");
}

#[test]
fn shebang_line_is_skipped() {
    check("#!/usr/bin/env luma\nassert(true)");
}
