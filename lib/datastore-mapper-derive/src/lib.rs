use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Lit, parse_macro_input};

/// Stored names filled from document metadata.
const RESERVED_FIELD_NAMES: [&str; 4] = ["uid", "createdAt", "updatedAt", "deletedAt"];

/// Parsed `#[property(...)]` attribute of one field.
struct PropertyAttr {
    kind: proc_macro2::TokenStream,
    name: Option<String>,
    exclude_from_indexes: bool,
}

impl Default for PropertyAttr {
    fn default() -> Self {
        Self {
            kind: quote! { datastore_mapper::PropertyKind::Raw },
            name: None,
            exclude_from_indexes: false,
        }
    }
}

/// Parse `#[model(kind = "...")]` and return the kind override
fn parse_model_kind(input: &DeriveInput) -> Option<String> {
    for attr in &input.attrs {
        if attr.path().is_ident("model") {
            let mut kind = None;
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("kind") {
                    meta.input.parse::<syn::Token![=]>()?;
                    let lit: Lit = meta.input.parse()?;
                    if let Lit::Str(s) = lit {
                        kind = Some(s.value());
                    }
                }
                Ok(())
            });
            return kind;
        }
    }
    None
}

/// Parse an integer literal following `=`
fn parse_usize(meta: &syn::meta::ParseNestedMeta) -> syn::Result<usize> {
    meta.input.parse::<syn::Token![=]>()?;
    let lit: syn::LitInt = meta.input.parse()?;
    lit.base10_parse()
}

/// Parse `#[property(...)]` on a field, defaulting to a raw property
fn parse_property_attr(field: &syn::Field) -> syn::Result<PropertyAttr> {
    let mut parsed = PropertyAttr::default();

    for attr in &field.attrs {
        if !attr.path().is_ident("property") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let path = &meta.path;
            if path.is_ident("raw") {
                parsed.kind = quote! { datastore_mapper::PropertyKind::Raw };
            } else if path.is_ident("string") {
                parsed.kind = quote! { datastore_mapper::PropertyKind::String };
            } else if path.is_ident("url") {
                parsed.kind = quote! { datastore_mapper::PropertyKind::Url };
            } else if path.is_ident("email") {
                parsed.kind = quote! { datastore_mapper::PropertyKind::Email };
            } else if path.is_ident("identifier") {
                parsed.kind = quote! { datastore_mapper::PropertyKind::Identifier };
            } else if path.is_ident("entity") {
                parsed.kind = quote! { datastore_mapper::PropertyKind::EntityRef };
            } else if path.is_ident("random_string") {
                let mut min = 8usize;
                let mut max = 12usize;
                if meta.input.peek(syn::token::Paren) {
                    meta.parse_nested_meta(|bound| {
                        if bound.path.is_ident("min") {
                            min = parse_usize(&bound)?;
                        } else if bound.path.is_ident("max") {
                            max = parse_usize(&bound)?;
                        } else {
                            return Err(bound.error("expected `min` or `max`"));
                        }
                        Ok(())
                    })?;
                }
                parsed.kind = quote! {
                    datastore_mapper::PropertyKind::RandomString { min: #min, max: #max }
                };
            } else if path.is_ident("name") {
                meta.input.parse::<syn::Token![=]>()?;
                let lit: Lit = meta.input.parse()?;
                match lit {
                    Lit::Str(s) => parsed.name = Some(s.value()),
                    _ => return Err(meta.error("expected a string literal")),
                }
            } else if path.is_ident("exclude_from_indexes") {
                parsed.exclude_from_indexes = true;
            } else {
                return Err(meta.error("unknown property attribute"));
            }
            Ok(())
        })?;
    }

    Ok(parsed)
}

/// Derive macro for the `Model` trait
///
/// Generates a static `ModelDescriptor` listing every named field, in
/// declaration order, with its validation kind, and an `into_inputs()` that
/// turns a struct value into named hydration inputs.
///
/// ## Attributes
///
/// - `#[model(kind = "...")]` - override the kind (defaults to the struct name)
/// - `#[property(string | url | email | identifier | entity | raw)]`
/// - `#[property(random_string)]` or `#[property(random_string(min = 8, max = 12))]`
/// - `#[property(name = "storedName")]` - override the stored field name
/// - `#[property(exclude_from_indexes)]` - keep the field out of indexes
///
/// Fields without `#[property]` are raw. `Option` fields that are `None`
/// produce no input. Stored names `uid`, `createdAt`, `updatedAt` and
/// `deletedAt` are rejected at compile time.
///
/// ## Example
///
/// ```text
/// #[derive(Model)]
/// #[model(kind = "Account")]
/// pub struct Account {
///     #[property(string)]
///     pub name: String,
///     #[property(email)]
///     pub email: String,
///     #[property(string, exclude_from_indexes)]
///     pub bio: Option<String>,
/// }
/// // Use: let doc = Document::from_model(client, account)?;
/// ```
#[proc_macro_derive(Model, attributes(model, property))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => panic!("Model only supports structs with named fields"),
        },
        _ => panic!("Model only supports structs"),
    };

    let kind = parse_model_kind(&input).unwrap_or_else(|| name.to_string());

    let mut descriptors = Vec::new();
    let mut inputs = Vec::new();

    for field in fields.iter() {
        let field_ident = field.ident.as_ref().unwrap();
        let attr = match parse_property_attr(field) {
            Ok(attr) => attr,
            Err(e) => return e.to_compile_error().into(),
        };

        let stored_name = attr.name.unwrap_or_else(|| field_ident.to_string());
        if RESERVED_FIELD_NAMES.contains(&stored_name.as_str()) {
            return syn::Error::new_spanned(
                field_ident,
                format!(
                    "`{}` is written from document metadata; rename the field or use #[property(name = \"...\")]",
                    stored_name
                ),
            )
            .to_compile_error()
            .into();
        }
        let property_kind = attr.kind;
        let exclude = attr.exclude_from_indexes;

        descriptors.push(quote! {
            datastore_mapper::FieldDescriptor::new(#stored_name, #property_kind)
                .exclude_from_indexes(#exclude)
        });
        inputs.push(quote! {
            if let Some(value) = datastore_mapper::IntoInput::into_input(self.#field_ident) {
                inputs.push((#stored_name, value));
            }
        });
    }

    let expanded = quote! {
        impl #impl_generics datastore_mapper::Model for #name #ty_generics #where_clause {
            fn descriptor() -> &'static datastore_mapper::ModelDescriptor {
                static DESCRIPTOR: ::std::sync::OnceLock<datastore_mapper::ModelDescriptor> =
                    ::std::sync::OnceLock::new();
                DESCRIPTOR.get_or_init(|| {
                    datastore_mapper::ModelDescriptor::new(#kind, vec![#(#descriptors),*])
                })
            }

            fn into_inputs(self) -> ::std::vec::Vec<(&'static str, datastore_mapper::Value)> {
                #[allow(unused_mut)]
                let mut inputs = ::std::vec::Vec::new();
                #(#inputs)*
                inputs
            }
        }
    };

    TokenStream::from(expanded)
}
