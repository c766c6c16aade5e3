use lox::{LoxError, TokenType, tokenize};

fn listing(source: &str) -> Vec<String> {
    let (tokens, _) = tokenize(source);
    tokens.iter().map(|t| t.to_string()).collect()
}

#[test]
fn scans_simple_expression() {
    assert_eq!(
        listing("(1 + 2)"),
        vec![
            "LEFT_PAREN ( null",
            "NUMBER 1 1.0",
            "PLUS + null",
            "NUMBER 2 2.0",
            "RIGHT_PAREN ) null",
            "EOF  null",
        ]
    );
}

#[test]
fn scans_all_comparison_operators() {
    let (tokens, _) = tokenize("! != = == < <= > >=");
    let types: Vec<TokenType> = tokens.iter().map(|t| t.token_type).collect();
    assert_eq!(
        types,
        vec![
            TokenType::Bang,
            TokenType::BangEqual,
            TokenType::Equal,
            TokenType::EqualEqual,
            TokenType::Less,
            TokenType::LessEqual,
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::Eof,
        ]
    );
}

#[test]
fn continues_scanning_after_error() {
    let (tokens, errors) = tokenize("(@$)");
    let messages: Vec<String> = errors.iter().map(LoxError::message).collect();
    assert_eq!(
        messages,
        vec!["Unexpected character: @", "Unexpected character: $"]
    );
    assert_eq!(tokens.len(), 3);
}

#[test]
fn comments_are_skipped() {
    assert_eq!(
        listing("( // a comment ) here\n)"),
        vec!["LEFT_PAREN ( null", "RIGHT_PAREN ) null", "EOF  null"]
    );
}

#[test]
fn multiline_string_keeps_newlines_and_advances_line() {
    let (tokens, errors) = tokenize("\"line 1\nline 2\"\nx");
    assert!(errors.is_empty());
    assert_eq!(tokens[0].to_string(), "STRING \"line 1\nline 2\" line 1\nline 2");
    assert_eq!(tokens[1].line, 3);
}

#[test]
fn unterminated_string_still_ends_with_eof() {
    let (tokens, errors) = tokenize("print(\"no end");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message(), "Unterminated string.");
    assert_eq!(tokens.last().map(|t| t.token_type), Some(TokenType::Eof));
}

#[test]
fn trailing_dot_is_not_part_of_number() {
    assert_eq!(
        listing("12."),
        vec!["NUMBER 12 12.0", "DOT . null", "EOF  null"]
    );
}
