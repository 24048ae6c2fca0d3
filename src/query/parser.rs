//! nom grammar for tag expressions
//!
//! Approximate grammar:
//!     FullExpr := Space* OrExpr Space*
//!     OrExpr   := AndExpr (("or"|"OR") AndExpr)*
//!     AndExpr  := Unary (("and"|"AND"|"") Unary)*
//!     Unary    := ("not"|"NOT"|"-") Unary | ParensExpr | TagName
//!     ParensExpr := "(" FullExpr ")"
//!     TagName  := (EscapedChar | !SpecialChar)+
//!
//! Whitespace around operators is tricky: "a and b" is equivalent to
//! "(a)and(b)" but not to "a andb", so keywords are only recognised when
//! followed by a separator. Reserved keywords are rejected as tag names
//! here; the remaining naming rules are enforced at tag creation, which
//! allows more precise error messages.

use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, tag, take, take_till1, take_while, take_while1};
use nom::character::complete::{char, one_of};
use nom::combinator::{eof, map, opt, peek, value};
use nom::error::{Error, ErrorKind};
use nom::multi::many0;
use nom::sequence::{delimited, preceded, terminated, tuple};
use nom::IResult;

use super::Expression;

/// Characters that end a tag name unless escaped with '\'
const SPECIAL_CHARS: &str = r"\()<>=,-";

/// Keywords forbidden as bare tag names. The empty string guards against
/// an escape-only match consuming nothing.
const RESERVED_KEYWORDS: &[&str] = &["", "not", "and", "or"];

pub(super) fn parse_blank(input: &str) -> IResult<&str, &str> {
    terminated(white0, eof)(input)
}

pub(super) fn parse_expr(input: &str) -> IResult<&str, Expression> {
    map(tuple((full_expr, eof)), |(expr, _)| expr)(input)
}

fn white0(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| c.is_whitespace())(input)
}

fn white1(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_whitespace())(input)
}

/// Match a keyword, in lowercase or uppercase but not mixed case, only
/// when followed by a separator (so "orb" stays a tag name).
fn keyword(word: &'static str) -> impl Fn(&str) -> IResult<&str, &str> {
    let lower = word.to_lowercase();
    let upper = word.to_uppercase();
    move |input| {
        let keyword_no_case = alt((tag(lower.as_str()), tag(upper.as_str())));
        terminated(keyword_no_case, keyword_boundary)(input)
    }
}

fn keyword_boundary(input: &str) -> IResult<&str, ()> {
    peek(alt((value((), white1), value((), one_of("()-")))))(input)
}

fn make_not(operand: Expression) -> Expression {
    Expression::Not(Box::new(operand))
}

fn make_and(left: Expression, right: Expression) -> Expression {
    Expression::And(Box::new(left), Box::new(right))
}

fn make_or(left: Expression, right: Expression) -> Expression {
    Expression::Or(Box::new(left), Box::new(right))
}

/// Parse a tag name: any run of escaped or non-special characters.
fn tag_name(input: &str) -> IResult<&str, Expression> {
    let mut parser = escaped_transform(
        |i| take_till1(|c: char| SPECIAL_CHARS.contains(c) || c.is_whitespace())(i),
        '\\',
        take(1usize),
    );

    // A parsed name equal to a keyword is only reserved when it was written
    // verbatim: "\or" consumes one extra input character and is a tag.
    fn is_keyword(original_len: usize, remaining: &str, parsed: &str, keyword: &str) -> bool {
        (parsed.eq(&keyword.to_lowercase()) || parsed.eq(&keyword.to_uppercase()))
            && original_len == keyword.len() + remaining.len()
    }

    match parser(input) {
        Ok((remaining, name)) => {
            for keyword in RESERVED_KEYWORDS {
                if is_keyword(input.len(), remaining, &name, keyword) {
                    return Err(nom::Err::Error(Error::new(remaining, ErrorKind::Tag)));
                }
            }
            Ok((remaining, Expression::Tag(name)))
        }
        Err(e) => Err(e),
    }
}

fn parens_expr(input: &str) -> IResult<&str, Expression> {
    delimited(char('('), full_expr, char(')'))(input)
}

/// A negation: the "not" keyword or the "-" shorthand, applied to a unary
/// expression (so double negation parses).
fn negation(input: &str) -> IResult<&str, Expression> {
    let dash = preceded(char('-'), preceded(white0, unary_expr));
    let word = preceded(keyword("not"), preceded(white0, unary_expr));
    map(alt((dash, word)), make_not)(input)
}

fn unary_expr(input: &str) -> IResult<&str, Expression> {
    alt((negation, parens_expr, tag_name))(input)
}

/// One or more unary expressions joined by "and" or by juxtaposition.
fn and_expr(input: &str) -> IResult<&str, Expression> {
    let and_keyword = tuple((white0, opt(tuple((keyword("and"), white0)))));
    let parser = tuple((unary_expr, many0(preceded(and_keyword, unary_expr))));

    map(parser, |(first, rest)| fold_expressions(first, rest, make_and))(input)
}

fn or_expr(input: &str) -> IResult<&str, Expression> {
    let or_keyword = delimited(white0, keyword("or"), white0);
    let parser = tuple((and_expr, many0(preceded(or_keyword, and_expr))));

    map(parser, |(first, rest)| fold_expressions(first, rest, make_or))(input)
}

fn full_expr(input: &str) -> IResult<&str, Expression> {
    delimited(white0, or_expr, white0)(input)
}

/// Fold the operands of an associative operator into a right-leaning tree.
fn fold_expressions(
    first: Expression,
    rest: Vec<Expression>,
    merge: fn(Expression, Expression) -> Expression,
) -> Expression {
    let mut all = vec![first];
    all.extend(rest);

    // Safe to unwrap: "all" starts non-empty and shrinks one at a time
    let mut expr = all.pop().unwrap();
    while let Some(previous) = all.pop() {
        expr = merge(previous, expr);
    }
    expr
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tag(name: &str) -> Expression {
        Expression::Tag(name.to_owned())
    }

    fn assert_parse<F>(parsing_func: F, to_parse: &str, expected: &Expression)
    where
        F: Fn(&str) -> IResult<&str, Expression>,
    {
        match parsing_func(to_parse) {
            Ok((_, expr)) => assert_eq!(&expr, expected, "\nexpr: [{}]", to_parse),
            Err(e) => panic!("parsing failed for [{}]: {:?}", to_parse, e),
        }
    }

    #[test]
    fn can_parse_tag_name() {
        let assert_parse_tag = |input, expected| assert_parse(tag_name, input, &make_tag(expected));

        assert_parse_tag("aBc", "aBc");

        // Whitespace ends a name unless escaped
        assert_parse_tag("a b c", "a");
        assert_parse_tag(r"a\ b\ c", "a b c");
        assert!(tag_name(" abc").is_err());

        // Special characters end a name unless escaped
        assert_parse_tag("abc(def)g", "abc");
        assert_parse_tag(r"abc\(def\)g", "abc(def)g");
        assert_parse_tag("a-b", "a");
        assert_parse_tag(r"a\-b", "a-b");

        // Keywords
        assert!(tag_name("not").is_err());
        assert!(tag_name("NOT  ").is_err());
        assert!(tag_name("and").is_err());
        assert!(tag_name("or").is_err());
        assert_parse_tag("NoT", "NoT");
        assert_parse_tag(r"\or", "or");
        assert_parse_tag(r"o\r", "or");

        // Other
        assert!(tag_name("").is_err());
        assert!(tag_name(r"\").is_err());
        assert_parse_tag("€ñอั喂", "€ñอั喂");
    }

    #[test]
    fn can_parse_negation() {
        let assert_parse_not =
            |input, expected| assert_parse(negation, input, &make_not(make_tag(expected)));

        assert_parse_not("not foo", "foo");
        assert_parse_not("NOT   FoO ", "FoO");
        assert_parse_not("not(foo)", "foo");
        assert_parse_not("-foo", "foo");
        assert_parse_not("- foo", "foo");
        assert_parse_not("-(foo)", "foo");
        assert!(negation(r"\not foo").is_err());
        assert!(negation("not or").is_err());

        // Nested negation
        assert_parse(
            negation,
            "not not a",
            &make_not(make_not(make_tag("a"))),
        );
        assert_parse(negation, "--a", &make_not(make_not(make_tag("a"))));
        assert_parse(
            negation,
            "not (a or b)",
            &make_not(make_or(make_tag("a"), make_tag("b"))),
        );
    }

    #[test]
    fn can_parse_and_expr() {
        let a_and_b_and_c = make_and(make_tag("a"), make_and(make_tag("b"), make_tag("c")));

        assert_parse(and_expr, "a and b and c", &a_and_b_and_c);
        assert_parse(and_expr, "a and b c", &a_and_b_and_c);
        assert_parse(and_expr, "a b and c", &a_and_b_and_c);
        assert_parse(and_expr, "a b c", &a_and_b_and_c);
        assert_parse(and_expr, "a (b and c)", &a_and_b_and_c);
        assert_parse(and_expr, "(( a )and(b ) c)", &a_and_b_and_c);
        assert_parse(and_expr, "(a)b(c)", &a_and_b_and_c);

        // "andb" is a tag, not a keyword
        assert_parse(
            and_expr,
            "a andb",
            &make_and(make_tag("a"), make_tag("andb")),
        );
        assert_parse(
            and_expr,
            "not a not b",
            &make_and(make_not(make_tag("a")), make_not(make_tag("b"))),
        );
        assert_parse(
            and_expr,
            "a -b",
            &make_and(make_tag("a"), make_not(make_tag("b"))),
        );
        assert_parse(
            and_expr,
            "( a or b ) and c",
            &make_and(make_or(make_tag("a"), make_tag("b")), make_tag("c")),
        );
    }

    #[test]
    fn can_parse_or_expr() {
        let assert_parse_or = |input, left, right| {
            assert_parse(or_expr, input, &make_or(left, right));
        };

        assert_parse_or("a or b", make_tag("a"), make_tag("b"));
        assert_parse_or("(( a )or(b))", make_tag("a"), make_tag("b"));
        assert_parse_or("not a or b", make_not(make_tag("a")), make_tag("b"));
        assert_parse_or(
            "a b or c and d",
            make_and(make_tag("a"), make_tag("b")),
            make_and(make_tag("c"), make_tag("d")),
        );

        assert_parse(or_expr, "a and b", &make_and(make_tag("a"), make_tag("b")));
        assert_parse(or_expr, "a orb", &make_and(make_tag("a"), make_tag("orb")));
    }

    #[test]
    fn can_parse_full_expr() {
        assert_parse(full_expr, "  a  ", &make_tag("a"));
        assert_parse(full_expr, " a or a", &make_or(make_tag("a"), make_tag("a")));

        assert!(full_expr("").is_err());
        assert!(full_expr("()").is_err());

        // Trailing garbage: tolerated by full_expr, fatal for parse_expr
        assert!(full_expr("a and ()").is_ok());
        assert!(parse_expr("a and ()").is_err());
        assert!(parse_expr("a (").is_err());
    }

    #[test]
    fn detects_blank_input() {
        assert!(parse_blank("").is_ok());
        assert!(parse_blank(" \n\t\r    ").is_ok());
        assert!(parse_blank("     r").is_err());
    }
}
