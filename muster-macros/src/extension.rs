//! Extension-related macros.
//!
//! This module contains:
//! - `#[extension]` - Attribute macro that fills in identity methods on an
//!   `impl Extension for T` block

use proc_macro::TokenStream;
use quote::quote;
use syn::{
    Expr, Ident, ImplItem, ItemImpl, LitStr, Token, Type, parse::Parse, parse_macro_input,
    parse_quote,
};

/// Arguments for the `#[extension]` macro.
pub(crate) struct ExtensionArgs {
    pub name: Option<LitStr>,
    pub priority: Option<Expr>,
}

impl Parse for ExtensionArgs {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let mut name = None;
        let mut priority = None;

        while !input.is_empty() {
            let ident: Ident = input.parse()?;
            input.parse::<Token![=]>()?;

            match ident.to_string().as_str() {
                "name" => {
                    name = Some(input.parse()?);
                }
                "priority" => {
                    // An expression, so negative values and constants work.
                    priority = Some(input.parse()?);
                }
                other => {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("unknown attribute: {}", other),
                    ));
                }
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(ExtensionArgs { name, priority })
    }
}

/// Implementation of the `#[extension]` macro.
pub fn extension_impl(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as ExtensionArgs);
    let mut input = parse_macro_input!(item as ItemImpl);

    if input.trait_.is_none() {
        return syn::Error::new_spanned(
            &input.self_ty,
            "#[extension] must be placed on an `impl Extension for Type` block",
        )
        .to_compile_error()
        .into();
    }

    let defines = |method: &str| {
        input
            .items
            .iter()
            .any(|item| matches!(item, ImplItem::Fn(f) if f.sig.ident == method))
    };
    let has_name = defines("name");
    let has_priority = defines("priority");

    if has_name && args.name.is_some() {
        return syn::Error::new_spanned(
            &input.self_ty,
            "`name` is given both in #[extension] and as a method",
        )
        .to_compile_error()
        .into();
    }
    if has_priority && args.priority.is_some() {
        return syn::Error::new_spanned(
            &input.self_ty,
            "`priority` is given both in #[extension] and as a method",
        )
        .to_compile_error()
        .into();
    }

    if !has_name {
        let name = match args.name {
            Some(lit) => lit,
            None => match default_name(&input.self_ty) {
                Some(derived) => LitStr::new(&derived, proc_macro2::Span::call_site()),
                None => {
                    return syn::Error::new_spanned(
                        &input.self_ty,
                        "cannot derive an extension name for this type; use #[extension(name = \"...\")]",
                    )
                    .to_compile_error()
                    .into();
                }
            },
        };
        input.items.push(parse_quote! {
            fn name(&self) -> &str {
                #name
            }
        });
    }

    if let Some(priority) = args.priority {
        input.items.push(parse_quote! {
            fn priority(&self) -> i32 {
                #priority
            }
        });
    }

    let has_async_trait = input.attrs.iter().any(|attr| {
        attr.path()
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "async_trait")
    });
    if !has_async_trait {
        input.attrs.push(parse_quote!(#[::muster::async_trait]));
    }

    TokenStream::from(quote! { #input })
}

/// `ScoreBoard` → `score-board`.
fn default_name(self_ty: &Type) -> Option<String> {
    let Type::Path(path) = self_ty else {
        return None;
    };
    let ident = path.path.segments.last()?.ident.to_string();

    let mut out = String::with_capacity(ident.len() + 4);
    for (i, ch) in ident.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else if ch == '_' {
            out.push('-');
        } else {
            out.push(ch);
        }
    }
    Some(out)
}
