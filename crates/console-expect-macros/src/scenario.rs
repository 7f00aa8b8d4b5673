//! Scenario script macro implementation.
//!
//! This module implements the `scenario!` macro, a compact way to write a
//! scenario as a list of `;`-separated commands.

use proc_macro2::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Ident, LitInt, LitStr, Result, Token, braced};

use crate::timeout::TimeoutInput;

/// An expectation inside a command.
pub struct ExpectSpec {
    /// The pattern to match.
    pub pattern: LitStr,
    /// Whether this is a regex pattern.
    pub is_regex: bool,
    /// Optional timeout override (`within ...`).
    pub within: Option<TimeoutInput>,
    /// Whether a timeout is acceptable.
    pub optional: bool,
}

/// A single command in a scenario script.
pub enum Command {
    /// Set the scenario name.
    Name(LitStr),
    /// Set the scenario default timeout.
    Timeout(TimeoutInput),
    /// Send a line.
    Send(LitStr),
    /// Expect a pattern.
    Expect(ExpectSpec),
    /// Send a line repeatedly until it is answered.
    Probe {
        /// Line to send.
        line: LitStr,
        /// Expected answer.
        expect: ExpectSpec,
        /// Number of attempts, if given.
        attempts: Option<LitInt>,
    },
}

fn parse_pattern(input: ParseStream, is_regex: bool, optional: bool) -> Result<ExpectSpec> {
    let pattern: LitStr = input.parse()?;
    let text = pattern.value();
    if text.is_empty() {
        return Err(syn::Error::new(pattern.span(), "pattern is empty"));
    }
    // Validate regex at compile time, with the same byte-oriented engine the
    // harness matches with.
    if is_regex {
        if let Err(e) = regex::bytes::Regex::new(&text) {
            return Err(syn::Error::new(
                pattern.span(),
                format!("invalid regex: {e}"),
            ));
        }
    }

    let within = if input.peek(Ident) && input.fork().parse::<Ident>()? == "within" {
        let _: Ident = input.parse()?;
        Some(input.parse()?)
    } else {
        None
    };

    if optional && within.is_none() {
        return Err(syn::Error::new(
            pattern.span(),
            "optional expectations need an explicit `within` timeout",
        ));
    }

    Ok(ExpectSpec {
        pattern,
        is_regex,
        within,
        optional,
    })
}

impl Parse for Command {
    fn parse(input: ParseStream) -> Result<Self> {
        let keyword: Ident = input.parse()?;

        match keyword.to_string().as_str() {
            "name" => Ok(Self::Name(input.parse()?)),
            "timeout" => Ok(Self::Timeout(input.parse()?)),
            "send" | "sendln" => Ok(Self::Send(input.parse()?)),
            "expect" => Ok(Self::Expect(parse_pattern(input, false, false)?)),
            "expect_re" | "expect_regex" => Ok(Self::Expect(parse_pattern(input, true, false)?)),
            "optional" => Ok(Self::Expect(parse_pattern(input, false, true)?)),
            "optional_re" => Ok(Self::Expect(parse_pattern(input, true, true)?)),
            "probe" => {
                let line: LitStr = input.parse()?;
                let _: Token![=>] = input.parse()?;
                let expect = parse_pattern(input, false, false)?;
                let attempts = if input.peek(Ident) {
                    let word: Ident = input.parse()?;
                    if word != "attempts" {
                        return Err(syn::Error::new(word.span(), "expected `attempts`"));
                    }
                    let n: LitInt = input.parse()?;
                    if n.base10_parse::<u32>()? == 0 {
                        return Err(syn::Error::new(n.span(), "probe needs at least one attempt"));
                    }
                    Some(n)
                } else {
                    None
                };
                Ok(Self::Probe {
                    line,
                    expect,
                    attempts,
                })
            }
            other => Err(syn::Error::new(
                keyword.span(),
                format!("unknown scenario command: {other}"),
            )),
        }
    }
}

/// The scenario! macro input.
pub struct ScenarioInput {
    /// The commands in the script.
    pub commands: Punctuated<Command, Token![;]>,
}

impl Parse for ScenarioInput {
    fn parse(input: ParseStream) -> Result<Self> {
        // Handle braced or unbraced syntax
        let commands = if input.peek(syn::token::Brace) {
            let content;
            braced!(content in input);
            Punctuated::parse_terminated(&content)?
        } else {
            Punctuated::parse_terminated(input)?
        };

        Ok(Self { commands })
    }
}

fn expectation(spec: &ExpectSpec) -> TokenStream {
    let pattern = &spec.pattern;
    let mut tokens = if spec.is_regex {
        quote! { ::console_expect::scenario::Expectation::regex(#pattern) }
    } else {
        quote! { ::console_expect::scenario::Expectation::literal(#pattern) }
    };
    if let Some(within) = &spec.within {
        let duration = crate::timeout::expand(within);
        tokens = quote! { #tokens.timeout(#duration) };
    }
    if spec.optional {
        tokens = quote! { #tokens.optional() };
    }
    tokens
}

/// Generate code for the scenario! macro.
pub fn expand(input: ScenarioInput) -> TokenStream {
    let mut name = quote! { "scenario" };
    let mut default_timeout = None;
    let mut steps = Vec::new();

    for command in &input.commands {
        match command {
            Command::Name(lit) => name = quote! { #lit },
            Command::Timeout(t) => default_timeout = Some(crate::timeout::expand(t)),
            Command::Send(line) => steps.push(quote! {
                ::console_expect::scenario::Step::send(#line)
            }),
            Command::Expect(spec) => {
                let expectation = expectation(spec);
                steps.push(quote! {
                    ::console_expect::scenario::Step::expect(#expectation)
                });
            }
            Command::Probe {
                line,
                expect,
                attempts,
            } => {
                let expectation = expectation(expect);
                let attempts = attempts.as_ref().map_or_else(
                    || quote! { ::console_expect::scenario::DEFAULT_PROBE_ATTEMPTS },
                    |n| quote! { #n },
                );
                steps.push(quote! {
                    ::console_expect::scenario::Step::probe(#line, #expectation, #attempts)
                });
            }
        }
    }

    let default_timeout = default_timeout.map(|d| quote! { .default_timeout(#d) });

    quote! {
        ::console_expect::scenario::Scenario::new(#name)
            #default_timeout
            #(.step(#steps))*
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn parse_simple_scenario() {
        let input: ScenarioInput = parse_quote! {
            name "sema";
            timeout 10 s;
            send "start";
            expect "SUCCESS"
        };
        assert_eq!(input.commands.len(), 4);
    }

    #[test]
    fn parse_probe_and_optional() {
        let input: ScenarioInput = parse_quote! {
            probe "help" => "> " within 1 s attempts 10;
            optional "Second semaphore block" within 500 ms;
            expect_re r"OK\s*$" within 2 s;
        };
        assert_eq!(input.commands.len(), 3);
        assert!(matches!(
            &input.commands[0],
            Command::Probe { attempts: Some(_), .. }
        ));
        match &input.commands[1] {
            Command::Expect(spec) => assert!(spec.optional && spec.within.is_some()),
            _ => panic!("expected an expectation"),
        }
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let result: Result<ScenarioInput> = syn::parse2(quote! { expect_re "(unclosed" });
        assert!(result.is_err());
    }

    #[test]
    fn byte_regex_is_accepted() {
        // Matches a raw 0xFF byte, which a UTF-8 regex refuses to compile.
        let input: ScenarioInput = parse_quote! {
            expect_re r"(?-u)\xFF";
        };
        assert_eq!(input.commands.len(), 1);
    }

    #[test]
    fn optional_without_timeout_is_rejected() {
        let result: Result<ScenarioInput> = syn::parse2(quote! { optional "maybe" });
        assert!(result.is_err());
    }

    #[test]
    fn unknown_command_is_rejected() {
        let result: Result<ScenarioInput> = syn::parse2(quote! { reset "device" });
        assert!(result.is_err());
    }

    #[test]
    fn expansion_builds_scenario() {
        let input: ScenarioInput = parse_quote! {
            name "mutex_3threads";
            expect "3rd";
            expect "2nd"
        };
        let code: String = expand(input).to_string().split_whitespace().collect();
        assert!(code.contains("Scenario::new(\"mutex_3threads\")"));
        assert_eq!(code.matches("Step::expect(").count(), 2);
    }
}
