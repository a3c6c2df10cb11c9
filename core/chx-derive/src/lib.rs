//! CHX Derive — procedural macros for CHX table declarations.
//!
//! Provides `#[derive(Table)]`, which implements `chx_core::TableDefinition`
//! with the physical name resolved at compile time.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{DeriveInput, LitStr, parse_macro_input};

const TABLE_TYPE_SUFFIX: &str = "ClickHouseTable";

/// Derive macro for table declarations.
///
/// # Example
///
/// ```ignore
/// #[derive(Table)]
/// #[chx(writer = "writer", source = "dictionary")]
/// pub struct CurrencyClickHouseTable;
///
/// assert_eq!(CurrencyClickHouseTable::TABLE_NAME, "currency");
/// ```
///
/// Attributes (all optional):
/// - `table_name`: explicit physical name; default strips `ClickHouseTable`
///   from the type name and lowercases the first letter
/// - `reader` / `writer` / `cache`: connection profiles (`writer` absent = read-only)
/// - `source`: `"dictionary"` or `"mysql"` for external-source tables
///
/// Generates:
/// - `TABLE_NAME` constant
/// - `chx_core::TableDefinition` implementation
#[proc_macro_derive(Table, attributes(chx))]
pub fn derive_table(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

#[derive(Default)]
struct TableAttrs {
    table_name: Option<LitStr>,
    reader: Option<LitStr>,
    writer: Option<LitStr>,
    cache: Option<LitStr>,
    source: Option<LitStr>,
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let attrs = parse_attrs(input)?;

    let table_name = match &attrs.table_name {
        Some(lit) if lit.value().is_empty() => {
            return Err(syn::Error::new(lit.span(), "table_name must not be empty"));
        }
        Some(lit) => lit.value(),
        None => conventional_name(&name.to_string()).ok_or_else(|| {
            syn::Error::new(
                name.span(),
                format!(
                    "`{name}` does not follow the `<Name>{TABLE_TYPE_SUFFIX}` convention; \
                     add #[chx(table_name = \"...\")]"
                ),
            )
        })?,
    };

    let reader = lit_or(&attrs.reader, "default");
    let cache = lit_or(&attrs.cache, "default");
    let writer = match &attrs.writer {
        Some(lit) => quote! { ::core::option::Option::Some(#lit) },
        None => quote! { ::core::option::Option::None },
    };
    let source = match &attrs.source {
        None => quote! { ::chx_core::SourceKind::Native },
        Some(lit) => match lit.value().as_str() {
            "dictionary" => quote! { ::chx_core::SourceKind::MySqlDictionary },
            "mysql" => quote! { ::chx_core::SourceKind::MySqlEngine },
            other => {
                return Err(syn::Error::new(
                    lit.span(),
                    format!("unknown source `{other}`, expected \"dictionary\" or \"mysql\""),
                ));
            }
        },
    };

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            pub const TABLE_NAME: &'static str = #table_name;
        }

        impl #impl_generics ::chx_core::TableDefinition for #name #ty_generics #where_clause {
            const TABLE: &'static str = #table_name;
            const READER_PROFILE: &'static str = #reader;
            const WRITER_PROFILE: ::core::option::Option<&'static str> = #writer;
            const CACHE_PROFILE: &'static str = #cache;
            const SOURCE: ::chx_core::SourceKind = #source;
        }
    })
}

fn parse_attrs(input: &DeriveInput) -> syn::Result<TableAttrs> {
    let mut attrs = TableAttrs::default();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("chx")) {
        attr.parse_nested_meta(|meta| {
            let slot = if meta.path.is_ident("table_name") {
                &mut attrs.table_name
            } else if meta.path.is_ident("reader") {
                &mut attrs.reader
            } else if meta.path.is_ident("writer") {
                &mut attrs.writer
            } else if meta.path.is_ident("cache") {
                &mut attrs.cache
            } else if meta.path.is_ident("source") {
                &mut attrs.source
            } else {
                return Err(meta.error("unsupported chx attribute"));
            };
            *slot = Some(meta.value()?.parse()?);
            Ok(())
        })?;
    }
    Ok(attrs)
}

fn lit_or(lit: &Option<LitStr>, default: &str) -> LitStr {
    lit.clone()
        .unwrap_or_else(|| LitStr::new(default, Span::call_site()))
}

/// `WidgetClickHouseTable` → `widget`
fn conventional_name(type_name: &str) -> Option<String> {
    let stem = type_name.strip_suffix(TABLE_TYPE_SUFFIX)?;
    let mut chars = stem.chars();
    let first = chars.next()?;
    let mut name: String = first.to_lowercase().collect();
    name.push_str(chars.as_str());
    Some(name)
}
