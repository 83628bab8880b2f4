use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, terminated},
    IResult,
};
use crate::types::InsightError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    /// `[column name]`
    Column(String),
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn number(input: &str) -> IResult<&str, Token> {
    map_res(
        recognize(pair(digit1, opt(pair(char('.'), digit1)))),
        |s: &str| s.parse::<f64>().map(Token::Number),
    )(input)
}

fn string_literal(input: &str) -> IResult<&str, Token> {
    map(
        alt((
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        )),
        |s: &str| Token::Str(s.to_string()),
    )(input)
}

fn bracketed_column(input: &str) -> IResult<&str, Token> {
    map(
        delimited(char('['), take_while1(|c| c != ']'), char(']')),
        |s: &str| Token::Column(s.trim().to_string()),
    )(input)
}

fn identifier(input: &str) -> IResult<&str, Token> {
    map(
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_'),
            take_while(|c: char| c.is_alphanumeric() || c == '_'),
        )),
        |s: &str| Token::Ident(s.to_string()),
    )(input)
}

fn operator(input: &str) -> IResult<&str, Token> {
    alt((
        // two-character operators before their one-character prefixes
        alt((
            value(Token::Eq, tag("==")),
            value(Token::Ne, tag("!=")),
            value(Token::Ne, tag("<>")),
            value(Token::Le, tag("<=")),
            value(Token::Ge, tag(">=")),
            value(Token::And, tag("&&")),
            value(Token::Or, tag("||")),
        )),
        alt((
            value(Token::Eq, char('=')),
            value(Token::Lt, char('<')),
            value(Token::Gt, char('>')),
            value(Token::Not, char('!')),
            value(Token::Plus, char('+')),
            value(Token::Minus, char('-')),
            value(Token::Star, char('*')),
            value(Token::Slash, char('/')),
            value(Token::Percent, char('%')),
            value(Token::LParen, char('(')),
            value(Token::RParen, char(')')),
            value(Token::Comma, char(',')),
        )),
    ))(input)
}

fn token(input: &str) -> IResult<&str, Token> {
    alt((number, string_literal, bracketed_column, identifier, operator))(input)
}

/// Splits a formula into tokens; any unrecognized character is a formula error.
pub fn tokenize(input: &str) -> Result<Vec<Token>, InsightError> {
    let mut lexer = all_consuming(terminated(many0(ws(token)), multispace0));
    match lexer(input) {
        Ok((_, tokens)) => Ok(tokens),
        Err(_) => {
            // many0 stops at the first bad token; report where
            let consumed = many0(ws(token))(input).map_or(0, |(rest, _)| input.len() - rest.len());
            Err(InsightError::Formula(format!(
                "unexpected input at offset {consumed}: '{}'",
                &input[consumed..]
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_expression() {
        let tokens = tokenize("IF(amt >= 10, UPPER(name), 'low')").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("IF".into()),
                Token::LParen,
                Token::Ident("amt".into()),
                Token::Ge,
                Token::Number(10.0),
                Token::Comma,
                Token::Ident("UPPER".into()),
                Token::LParen,
                Token::Ident("name".into()),
                Token::RParen,
                Token::Comma,
                Token::Str("low".into()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_bracketed_column_and_operators() {
        let tokens = tokenize("[unit price] * 1.5 <> 3 && !x").unwrap();
        assert_eq!(tokens[0], Token::Column("unit price".into()));
        assert_eq!(tokens[2], Token::Number(1.5));
        assert_eq!(tokens[3], Token::Ne);
        assert_eq!(tokens[5], Token::And);
        assert_eq!(tokens[6], Token::Not);
    }

    #[test]
    fn test_non_ascii_identifier() {
        let tokens = tokenize("销售额 * 2 + _x1").unwrap();
        assert_eq!(tokens[0], Token::Ident("销售额".into()));
        assert_eq!(tokens[1], Token::Star);
        assert_eq!(tokens[4], Token::Ident("_x1".into()));
    }

    #[test]
    fn test_rejects_unknown_characters() {
        let err = tokenize("a ; b").unwrap_err();
        assert!(matches!(err, InsightError::Formula(msg) if msg.contains("offset 2")));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(tokenize("'abc").is_err());
    }
}
