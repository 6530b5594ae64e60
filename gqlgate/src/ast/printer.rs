// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Deterministic printer for AST nodes
//!
//! Output is a single line with one space between tokens, so two ASTs that
//! are equal print to byte-identical strings. The normalizer hashes this
//! output and the planner embeds it in subgraph fetches.

use crate::ast::ast::*;

/// Print an operation definition, always spelling out the operation keyword
pub fn print_operation(operation: &OperationDefinition) -> String {
    let mut out = String::with_capacity(128);
    out.push_str(operation.kind.keyword());

    if let Some(name) = &operation.name {
        out.push(' ');
        out.push_str(name);
    }

    if !operation.variable_definitions.is_empty() {
        out.push('(');
        for (i, definition) in operation.variable_definitions.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push('$');
            out.push_str(&definition.name);
            out.push_str(": ");
            out.push_str(&definition.var_type.to_string());
            if let Some(default) = &definition.default_value {
                out.push_str(" = ");
                print_value(default, &mut out);
            }
            print_directives(&definition.directives, &mut out);
        }
        out.push(')');
    }

    print_directives(&operation.directives, &mut out);
    out.push(' ');
    print_selection_set(&operation.selection_set, &mut out);
    out
}

/// Print a selection set including its braces
pub fn print_selection_set(selection_set: &SelectionSet, out: &mut String) {
    out.push('{');
    for selection in &selection_set.items {
        out.push(' ');
        print_selection(selection, out);
    }
    out.push_str(" }");
}

/// Print a single selection without surrounding braces
pub fn print_selection(selection: &Selection, out: &mut String) {
    match selection {
        Selection::Field(field) => {
            if let Some(alias) = &field.alias {
                out.push_str(alias);
                out.push_str(": ");
            }
            out.push_str(&field.name);
            print_arguments(&field.arguments, out);
            print_directives(&field.directives, out);
            if !field.selection_set.is_empty() {
                out.push(' ');
                print_selection_set(&field.selection_set, out);
            }
        }
        Selection::FragmentSpread(spread) => {
            out.push_str("...");
            out.push_str(&spread.fragment_name);
            print_directives(&spread.directives, out);
        }
        Selection::InlineFragment(inline) => {
            out.push_str("...");
            if let Some(type_condition) = &inline.type_condition {
                out.push_str(" on ");
                out.push_str(type_condition);
            }
            print_directives(&inline.directives, out);
            out.push(' ');
            print_selection_set(&inline.selection_set, out);
        }
    }
}

fn print_arguments(arguments: &[Argument], out: &mut String) {
    if arguments.is_empty() {
        return;
    }
    out.push('(');
    for (i, argument) in arguments.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&argument.name);
        out.push_str(": ");
        print_value(&argument.value, out);
    }
    out.push(')');
}

fn print_directives(directives: &[Directive], out: &mut String) {
    for directive in directives {
        out.push_str(" @");
        out.push_str(&directive.name);
        print_arguments(&directive.arguments, out);
    }
}

/// Print an input value in GraphQL syntax
pub fn print_value(value: &Value, out: &mut String) {
    match value {
        Value::Variable(name) => {
            out.push('$');
            out.push_str(name);
        }
        Value::Int(n) | Value::Float(n) => out.push_str(n),
        Value::String(s) => print_string(s, out),
        Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Null => out.push_str("null"),
        Value::Enum(e) => out.push_str(e),
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                print_value(item, out);
            }
            out.push(']');
        }
        Value::Object(fields) => {
            out.push('{');
            for (i, (name, field_value)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(name);
                out.push_str(": ");
                print_value(field_value, out);
            }
            out.push('}');
        }
    }
}

fn print_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parser::parse_document;

    fn reprint(input: &str) -> String {
        let document = parse_document(input).unwrap();
        let operation = document.operations().next().unwrap();
        print_operation(operation)
    }

    #[test]
    fn test_print_shorthand() {
        assert_eq!(reprint("{a b{c}}"), "query { a b { c } }");
    }

    #[test]
    fn test_print_full_operation() {
        assert_eq!(
            reprint(
                "query Q($id: ID! = \"x\", $n: [Int]) @cached { u: user(id: $id, n: $n) @skip(if: false) { ... on User { name } } }"
            ),
            "query Q($id: ID! = \"x\", $n: [Int]) @cached { u: user(id: $id, n: $n) @skip(if: false) { ... on User { name } } }"
        );
    }

    #[test]
    fn test_print_values() {
        assert_eq!(
            reprint(r#"{ f(a: [1, 2.5], b: {c: null, d: ENUM}, e: "q\"\n") }"#),
            r#"query { f(a: [1, 2.5], b: {c: null, d: ENUM}, e: "q\"\n") }"#
        );
    }

    #[test]
    fn test_print_is_reparseable() {
        let printed = reprint("mutation M { a(x: 1) { ...F } } fragment F on T { b }");
        assert_eq!(printed, reprint(&printed));
    }
}
