use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{DeriveInput, parse_macro_input};

/// Attribute macro that derives everything a record type usually needs.
///
/// This is syntax sugar that expands to:
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, Payload)]
/// ```
///
/// Additionally, every `Option<T>` field gets
/// `#[serde(default, skip_serializing_if = "Option::is_none")]` unless it
/// already carries a `serde(default)` or `serde(skip_serializing_if)`.
///
/// # Example
///
/// ```ignore
/// use rekey_core::{record, Reference};
///
/// #[record]
/// struct Observation {
///     status: String,
///     subject: Option<Reference>,
/// }
/// ```
#[proc_macro_attribute]
pub fn record(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);

    let modified = add_serde_attributes(input);

    let output = quote! {
        #[derive(
            ::std::fmt::Debug,
            ::std::clone::Clone,
            ::std::cmp::PartialEq,
            ::serde::Serialize,
            ::serde::Deserialize,
            ::rekey_core::Payload
        )]
        #modified
    };

    output.into()
}

fn add_serde_attributes(mut input: DeriveInput) -> DeriveInput {
    match &mut input.data {
        syn::Data::Struct(data) => add_serde_attrs_to_fields(&mut data.fields),
        syn::Data::Enum(data) => {
            for variant in &mut data.variants {
                add_serde_attrs_to_fields(&mut variant.fields);
            }
        }
        syn::Data::Union(_) => {}
    }
    input
}

fn add_serde_attrs_to_fields(fields: &mut syn::Fields) {
    // Only named fields: serde rejects skip_serializing_if on tuple fields.
    if let syn::Fields::Named(named) = fields {
        for field in &mut named.named {
            if is_option(&field.ty) && !has_serde_default(&field.attrs) {
                field.attrs.push(syn::parse_quote! {
                    #[serde(default, skip_serializing_if = "Option::is_none")]
                });
            }
        }
    }
}

fn is_option(ty: &syn::Type) -> bool {
    match ty {
        syn::Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Option"),
        _ => false,
    }
}

fn has_serde_default(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|attr| {
        if !attr.path().is_ident("serde") {
            return false;
        }
        let mut found = false;
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") || meta.path.is_ident("skip_serializing_if") {
                found = true;
            }
            // Consume `= value` so parsing can continue past it.
            if meta.input.peek(syn::Token![=]) {
                let _: syn::Expr = meta.value()?.parse()?;
            }
            Ok(())
        });
        found
    })
}

/// Derive macro for the Payload trait.
///
/// Generates `visit_fields()` and `rewrite_fields()` that recurse into every
/// field. Reference-bearing fields are found through their types, so a field
/// of type `Reference`, `Uri`, `Narrative`, or any container of them, is
/// walked without further annotation.
///
/// # Attributes
///
/// - `#[payload(skip)]` - Do not walk this field
#[proc_macro_derive(Payload, attributes(payload))]
pub fn derive_payload(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_payload_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_payload_impl(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let generics = &input.generics;

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let where_clause = build_where_clause(generics, where_clause);

    let (visit_body, rewrite_body) = match &input.data {
        syn::Data::Struct(data) => struct_bodies(&data.fields)?,
        syn::Data::Enum(data) => enum_bodies(data)?,
        syn::Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Payload cannot be derived for unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::rekey_core::Payload for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn visit_fields(&self, visitor: &mut dyn ::rekey_core::FieldVisitor) {
                #visit_body
            }

            #[allow(unused_variables)]
            fn rewrite_fields<__W: ::rekey_core::FieldRewriter>(
                &mut self,
                rewriter: &mut __W,
            ) -> ::std::result::Result<(), __W::Error> {
                #rewrite_body
                ::std::result::Result::Ok(())
            }
        }
    })
}

fn build_where_clause(
    generics: &syn::Generics,
    existing: Option<&syn::WhereClause>,
) -> proc_macro2::TokenStream {
    let type_params: Vec<_> = generics.type_params().map(|p| &p.ident).collect();

    if type_params.is_empty() && existing.is_none() {
        return quote! {};
    }

    let payload_bounds = type_params.iter().map(|p| {
        quote! { #p: ::rekey_core::Payload }
    });

    let existing_predicates = existing
        .map(|w| {
            let predicates = &w.predicates;
            quote! { #predicates, }
        })
        .unwrap_or_default();

    quote! {
        where
            #existing_predicates
            #(#payload_bounds),*
    }
}

/// Field accessors (`self.name` / `self.0`) for every walked field.
fn walked_members(fields: &syn::Fields) -> Vec<proc_macro2::TokenStream> {
    fields
        .iter()
        .enumerate()
        .filter(|(_, f)| !parse_field_attrs(&f.attrs).skip)
        .map(|(i, f)| match &f.ident {
            Some(ident) => quote! { #ident },
            None => {
                let idx = syn::Index::from(i);
                quote! { #idx }
            }
        })
        .collect()
}

fn struct_bodies(
    fields: &syn::Fields,
) -> syn::Result<(proc_macro2::TokenStream, proc_macro2::TokenStream)> {
    let members = walked_members(fields);

    let visits = members.iter().map(|m| {
        quote! { ::rekey_core::Payload::visit_fields(&self.#m, visitor); }
    });
    let rewrites = members.iter().map(|m| {
        quote! { ::rekey_core::Payload::rewrite_fields(&mut self.#m, rewriter)?; }
    });

    Ok((quote! { #(#visits)* }, quote! { #(#rewrites)* }))
}

fn enum_bodies(
    data: &syn::DataEnum,
) -> syn::Result<(proc_macro2::TokenStream, proc_macro2::TokenStream)> {
    let mut visit_arms = Vec::new();
    let mut rewrite_arms = Vec::new();

    for variant in &data.variants {
        let variant_ident = &variant.ident;

        let (pattern, bindings) = match &variant.fields {
            syn::Fields::Unit => (quote! { Self::#variant_ident }, Vec::new()),
            syn::Fields::Named(fields) => {
                let bindings: Vec<_> = fields
                    .named
                    .iter()
                    .filter(|f| !parse_field_attrs(&f.attrs).skip)
                    .filter_map(|f| f.ident.clone())
                    .collect();
                (quote! { Self::#variant_ident { #(#bindings,)* .. } }, bindings)
            }
            syn::Fields::Unnamed(fields) => {
                let mut bindings = Vec::new();
                let patterns: Vec<_> = fields
                    .unnamed
                    .iter()
                    .enumerate()
                    .map(|(i, f)| {
                        if parse_field_attrs(&f.attrs).skip {
                            quote! { _ }
                        } else {
                            let binding = format_ident!("f{}", i);
                            bindings.push(binding.clone());
                            quote! { #binding }
                        }
                    })
                    .collect();
                (quote! { Self::#variant_ident(#(#patterns),*) }, bindings)
            }
        };

        visit_arms.push(quote! {
            #pattern => {
                #(::rekey_core::Payload::visit_fields(#bindings, visitor);)*
            }
        });
        rewrite_arms.push(quote! {
            #pattern => {
                #(::rekey_core::Payload::rewrite_fields(#bindings, rewriter)?;)*
            }
        });
    }

    if data.variants.is_empty() {
        return Ok((quote! {}, quote! {}));
    }

    Ok((
        quote! { match self { #(#visit_arms)* } },
        quote! { match self { #(#rewrite_arms)* } },
    ))
}

#[derive(Default)]
struct FieldAttrs {
    skip: bool,
}

fn parse_field_attrs(attrs: &[syn::Attribute]) -> FieldAttrs {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("payload") {
            continue;
        }

        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                result.skip = true;
            }
            Ok(())
        });
    }

    result
}
