use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Lit, LitStr, Meta, Type};

/// Derive macro describing the logical columns of a CSV import row.
///
/// For each named field it records:
/// - the canonical column name (respects `#[serde(rename = "...")]`)
/// - whether the column is required (anything that is not `Option<T>`)
/// - a description taken from the doc comments
/// - header aliases from `#[csv(alias = "...")]`, repeatable
///
/// Generates a `csv_fields() -> &'static [CsvField]` associated function. A
/// `CsvField` type with `name`, `required`, `description` and `aliases` fields
/// must be in scope where the derive is used.
#[proc_macro_derive(CsvFields, attributes(csv, serde))]
pub fn derive_csv_fields(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct FieldInfo {
    name: String,
    required: bool,
    description: String,
    aliases: Vec<String>,
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "CsvFields only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "CsvFields only supports structs",
            ))
        }
    };

    let mut infos = Vec::with_capacity(fields.len());
    for field in fields {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
        let column = serde_rename(&field.attrs)?.unwrap_or_else(|| ident.to_string());
        infos.push(FieldInfo {
            name: column,
            required: !is_option_type(&field.ty),
            description: doc_comment(&field.attrs),
            aliases: csv_aliases(&field.attrs)?,
        });
    }

    let entries = infos.iter().map(|info| {
        let FieldInfo {
            name,
            required,
            description,
            aliases,
        } = info;
        quote! {
            CsvField {
                name: #name,
                required: #required,
                description: #description,
                aliases: &[#(#aliases),*],
            }
        }
    });

    Ok(quote! {
        impl #name {
            pub fn csv_fields() -> &'static [CsvField] {
                static FIELDS: &[CsvField] = &[
                    #(#entries),*
                ];
                FIELDS
            }
        }
    })
}

fn csv_aliases(attrs: &[Attribute]) -> syn::Result<Vec<String>> {
    let mut aliases = Vec::new();
    for attr in attrs.iter().filter(|a| a.path().is_ident("csv")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("alias") {
                let value: LitStr = meta.value()?.parse()?;
                aliases.push(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported csv attribute, expected `alias = \"...\"`"))
            }
        })?;
    }
    Ok(aliases)
}

fn serde_rename(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut rename = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                rename = Some(value.value());
            } else if meta.input.peek(syn::Token![=]) {
                // other key = value serde options are not our concern
                let _: syn::Expr = meta.value()?.parse()?;
            }
            Ok(())
        })?;
    }
    Ok(rename)
}

fn doc_comment(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter_map(|attr| {
            if !attr.path().is_ident("doc") {
                return None;
            }
            if let Meta::NameValue(meta) = &attr.meta {
                if let syn::Expr::Lit(expr_lit) = &meta.value {
                    if let Lit::Str(lit_str) = &expr_lit.lit {
                        return Some(lit_str.value().trim().to_string());
                    }
                }
            }
            None
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}
