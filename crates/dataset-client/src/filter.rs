//! Filter-query parser and evaluator
//!
//! Parses the subset of the dataset query language that the facet tree
//! produces: equality and absence clauses joined by `and`.
//!
//! ```text
//! predicate := clause ( "and" clause )*   |  (empty)
//! clause    := attribute "=" ( 'text' | "text" | null )
//! ```
//!
//! Equality is case-insensitive, matching the data service's `iexact`
//! comparison. `null` selects records that carry no value for the attribute.

use std::collections::BTreeMap;

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while},
    character::complete::{alpha1, alphanumeric1, char, multispace0, multispace1, satisfy},
    combinator::{all_consuming, cut, map, not, recognize},
    error::{context, VerboseError},
    multi::{many0_count, separated_list1},
    sequence::{delimited, pair, terminated, tuple},
    IResult,
};

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// One conjunct of a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    Equals { attribute: String, value: String },
    Absent { attribute: String },
}

impl Clause {
    pub fn attribute(&self) -> &str {
        match self {
            Clause::Equals { attribute, .. } | Clause::Absent { attribute } => attribute,
        }
    }

    fn matches(&self, attributes: &BTreeMap<String, String>) -> bool {
        match self {
            Clause::Equals { attribute, value } => attributes
                .get(attribute)
                .map(|actual| actual.to_lowercase() == value.to_lowercase())
                .unwrap_or(false),
            Clause::Absent { attribute } => !attributes.contains_key(attribute),
        }
    }
}

/// A parsed predicate: all clauses must hold
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub clauses: Vec<Clause>,
}

impl Filter {
    /// True when every clause holds for the given attribute values
    pub fn matches(&self, attributes: &BTreeMap<String, String>) -> bool {
        self.clauses.iter().all(|c| c.matches(attributes))
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Parse predicate text into a [`Filter`]
///
/// The empty string (or whitespace) parses to the match-everything filter.
pub fn parse_filter(input: &str) -> Result<Filter, String> {
    match all_consuming(filter)(input) {
        Ok((_, parsed)) => Ok(parsed),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(nom::error::convert_error(input, e))
        }
        Err(nom::Err::Incomplete(_)) => Err("Incomplete input".to_string()),
    }
}

// ============================================================================
// Internal Parsers
// ============================================================================

fn filter(input: &str) -> Res<'_, Filter> {
    let (input, _) = multispace0(input)?;
    if input.is_empty() {
        return Ok((input, Filter::default()));
    }
    let (input, clauses) = separated_list1(conjunction, clause)(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, Filter { clauses }))
}

fn conjunction(input: &str) -> Res<'_, ()> {
    map(tuple((multispace1, tag_no_case("and"), multispace1)), |_| ())(input)
}

fn clause(input: &str) -> Res<'_, Clause> {
    let (input, attribute) = context("attribute", attribute)(input)?;
    let (input, _) = tuple((multispace0, char('='), multispace0))(input)?;
    let attribute = attribute.to_string();
    let result = cut(context(
        "value",
        alt((
            map(quoted, |value| Clause::Equals {
                attribute: attribute.clone(),
                value: value.to_string(),
            }),
            map(null_literal, |_| Clause::Absent {
                attribute: attribute.clone(),
            }),
        )),
    ))(input);
    result
}

fn attribute(input: &str) -> Res<'_, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn quoted(input: &str) -> Res<'_, &str> {
    alt((
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
    ))(input)
}

fn null_literal(input: &str) -> Res<'_, &str> {
    terminated(
        tag_no_case("null"),
        not(satisfy(|c: char| c.is_alphanumeric() || c == '_')),
    )(input)
}
