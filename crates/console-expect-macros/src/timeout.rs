//! Durations for `timeout!` and the `timeout` / `within` clauses of
//! `scenario!`.
//!
//! Console timeouts range from a few hundred milliseconds to a few minutes,
//! so only `ms`, `s` and `m` are accepted. Terms can be added with `+`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{Ident, LitInt, Result, Token};

/// A duration such as `500 ms` or `1 m + 30 s`, in milliseconds.
pub struct TimeoutInput {
    millis: u64,
}

fn unit_millis(unit: &Ident) -> Result<u64> {
    match unit.to_string().as_str() {
        "ms" => Ok(1),
        "s" => Ok(1_000),
        "m" => Ok(60_000),
        other => Err(syn::Error::new(
            unit.span(),
            format!("unknown time unit `{other}`, expected `ms`, `s` or `m`"),
        )),
    }
}

fn term(input: ParseStream) -> Result<u64> {
    let value: LitInt = input.parse()?;
    let unit: Ident = input.parse()?;
    value
        .base10_parse::<u64>()?
        .checked_mul(unit_millis(&unit)?)
        .ok_or_else(|| syn::Error::new(value.span(), "duration is too large"))
}

impl Parse for TimeoutInput {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut millis = term(input)?;
        while input.peek(Token![+]) {
            let plus: Token![+] = input.parse()?;
            millis = millis
                .checked_add(term(input)?)
                .ok_or_else(|| syn::Error::new(plus.span, "duration is too large"))?;
        }
        Ok(Self { millis })
    }
}

/// Generate a `Duration` expression.
pub fn expand(input: &TimeoutInput) -> TokenStream {
    let millis = input.millis;
    quote! {
        ::std::time::Duration::from_millis(#millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn single_term() {
        let input: TimeoutInput = parse_quote! { 5 s };
        assert_eq!(input.millis, 5_000);
    }

    #[test]
    fn compound_terms_add_up() {
        let input: TimeoutInput = parse_quote! { 1 m + 30 s + 500 ms };
        assert_eq!(input.millis, 90_500);
    }

    #[test]
    fn zero_is_allowed() {
        let input: TimeoutInput = parse_quote! { 0 ms };
        assert_eq!(input.millis, 0);
    }

    #[test]
    fn unknown_unit_is_rejected() {
        let result: Result<TimeoutInput> = syn::parse2(quote! { 5 fortnights });
        let err = result.err().map(|e| e.to_string()).unwrap_or_default();
        assert!(err.contains("fortnights"));
        // Units finer or coarser than a console needs are not accepted.
        assert!(syn::parse2::<TimeoutInput>(quote! { 10 us }).is_err());
        assert!(syn::parse2::<TimeoutInput>(quote! { 1 h }).is_err());
    }

    #[test]
    fn overflow_is_rejected() {
        let result: Result<TimeoutInput> = syn::parse2(quote! { 18446744073709551615 m });
        assert!(result.is_err());
    }

    #[test]
    fn expansion_uses_millis() {
        let input: TimeoutInput = parse_quote! { 1 s + 500 ms };
        let expanded = expand(&input).to_string().replace(' ', "");
        assert_eq!(expanded, "::std::time::Duration::from_millis(1500u64)");
    }
}
