use proc_macro::TokenStream;
use quote::quote;
use syn::parse::Parser;
use syn::{parse_macro_input, DeriveInput, ItemFn, LitStr};

#[derive(Clone, Copy)]
enum Format {
    Text,
    Table,
    Json,
    JsonPretty,
}

impl Format {
    fn to_tokens(self) -> proc_macro2::TokenStream {
        match self {
            Format::Text => quote!(::lifetrace::Format::Text),
            Format::Table => quote!(::lifetrace::Format::Table),
            Format::Json => quote!(::lifetrace::Format::Json),
            Format::JsonPretty => quote!(::lifetrace::Format::JsonPretty),
        }
    }
}

#[derive(Clone, Copy)]
enum Mode {
    None,
    Class,
    Alloc,
}

impl Mode {
    fn to_tokens(self) -> proc_macro2::TokenStream {
        match self {
            Mode::None => quote!(::lifetrace::TraceMode::NONE),
            Mode::Class => quote!(::lifetrace::TraceMode::CLASS),
            Mode::Alloc => quote!(::lifetrace::TraceMode::ALLOC),
        }
    }
}

/// Starts a lifetrace session for the duration of the annotated function and
/// writes the memory report when it returns.
///
/// Values created inside the function body are dropped before the report is
/// written, so anything still listed as live has leaked.
///
/// # Parameters
///
/// * `mode` - `"none"` (default), `"class"` or `"alloc"`
/// * `format` - `"text"` (default), `"table"`, `"json"` or `"json-pretty"`
///
/// # Examples
///
/// ```rust,ignore
/// #[lifetrace::main]
/// fn main() {
///     // Your code here
/// }
/// ```
///
/// ```rust,ignore
/// #[lifetrace::main(mode = "class", format = "table")]
/// fn main() {
///     // Your code here
/// }
/// ```
///
/// # Limitations
///
/// Only one session guard can be alive at a time. Creating a second one (either via
/// this macro or via [`GuardBuilder`](../lifetrace/struct.GuardBuilder.html)) panics.
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    let attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;

    let mut format = Format::Text;
    let mut mode = Mode::None;

    if !attr.is_empty() {
        let parser = syn::meta::parser(|meta| {
            if meta.path.is_ident("format") {
                meta.input.parse::<syn::Token![=]>()?;
                let lit: LitStr = meta.input.parse()?;
                format = match lit.value().as_str() {
                    "text" => Format::Text,
                    "table" => Format::Table,
                    "json" => Format::Json,
                    "json-pretty" => Format::JsonPretty,
                    other => return Err(meta.error(format!(
                        "Unknown format {:?}. Expected one of: \"text\", \"table\", \"json\", \"json-pretty\"",
                        other
                    ))),
                };
                return Ok(());
            }

            if meta.path.is_ident("mode") {
                meta.input.parse::<syn::Token![=]>()?;
                let lit: LitStr = meta.input.parse()?;
                mode = match lit.value().as_str() {
                    "none" => Mode::None,
                    "class" => Mode::Class,
                    "alloc" => Mode::Alloc,
                    other => {
                        return Err(meta.error(format!(
                            "Unknown mode {:?}. Expected one of: \"none\", \"class\", \"alloc\"",
                            other
                        )))
                    }
                };
                return Ok(());
            }

            Err(meta.error("Unknown parameter. Supported: mode=\"..\", format=\"..\""))
        });

        if let Err(e) = parser.parse2(proc_macro2::TokenStream::from(attr)) {
            return e.to_compile_error().into();
        }
    }

    let format_token = format.to_tokens();
    let mode_token = mode.to_tokens();
    let fn_name = &sig.ident;

    let guard_init = quote! {
        let _lifetrace = {
            let caller_name: &'static str =
                concat!(module_path!(), "::", stringify!(#fn_name));

            ::lifetrace::GuardBuilder::new(caller_name)
                .mode(#mode_token)
                .format(#format_token)
                .build()
        };
    };

    let body = if sig.asyncness.is_some() {
        quote! { async { #guard_init #block }.await }
    } else {
        quote! { #guard_init #block }
    };

    let output = quote! {
        #(#attrs)*
        #vis #sig {
            #body
        }
    };

    output.into()
}

/// Implements `lifetrace::Traced` using the type name as the tag.
///
/// Override the tag with `#[traced(tag = "...")]`. Tags starting with `_` mark
/// internal types, which class mode skips.
///
/// ```rust,ignore
/// #[derive(lifetrace::Traced)]
/// #[traced(tag = "_Buffer")]
/// struct Buffer(Vec<u8>);
/// ```
#[proc_macro_derive(Traced, attributes(traced))]
pub fn derive_traced(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    let ident = &input.ident;

    let mut tag = LitStr::new(&ident.to_string(), ident.span());

    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("traced")) {
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("tag") {
                let lit: LitStr = meta.value()?.parse()?;
                if lit.value().is_empty() {
                    return Err(meta.error("tag must not be empty"));
                }
                tag = lit;
                return Ok(());
            }
            Err(meta.error("Unknown parameter. Supported: tag=\"..\""))
        });

        if let Err(e) = parsed {
            return e.to_compile_error().into();
        }
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let output = quote! {
        impl #impl_generics ::lifetrace::Traced for #ident #ty_generics #where_clause {
            const TYPE_TAG: &'static str = #tag;
        }
    };

    output.into()
}
