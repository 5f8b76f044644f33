// Code generation helpers shared by the #[proxy] expansion
//
// Every generated path is absolute (`::interpose::...`) so expansions work
// regardless of what the calling module imports.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{GenericArgument, Ident, PathArguments, Type};

/// Derives the generated struct's name from the trait name.
///
/// Strips one leading `I` interface marker when it is followed by an
/// uppercase letter, then appends `Proxy`. Must agree with
/// `interpose::implementation_name`.
pub fn implementation_ident(trait_ident: &Ident) -> Ident {
    let name = trait_ident.to_string();
    let mut chars = name.chars();
    let stripped = match (chars.next(), chars.next()) {
        (Some('I'), Some(next)) if next.is_ascii_uppercase() => &name[1..],
        _ => name.as_str(),
    };
    format_ident!("{}Proxy", stripped, span = trait_ident.span())
}

/// Generates the boxing of one argument into a `Value`.
pub fn generate_to_value(arg_name: &Ident, arg_type: &Type) -> TokenStream {
    quote! {
        <#arg_type as ::interpose::ToValue>::to_value(#arg_name)
    }
}

/// Generates a `TypeRef` for a Rust type, taken from its `ValueType` impl.
pub fn generate_type_ref(ty: &Type) -> TokenStream {
    quote! {
        ::interpose::TypeRef::of::<#ty>()
    }
}

/// Generates the conversion of an interceptor result into `ty`.
///
/// Evaluates to `Result<ty, ProxyError>`.
pub fn generate_from_value(value: &Ident, ty: &Type) -> TokenStream {
    quote! {
        <#ty as ::interpose::FromValue>::from_value(#value)
    }
}

/// Returns `T` when `ty` is spelled as a `Result<T, ..>` (any path ending in
/// `Result`, so aliases such as `anyhow::Result<T>` qualify).
pub fn result_ok_type(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    if type_path.qself.is_some() {
        return None;
    }

    let segment = type_path.path.segments.last()?;
    if segment.ident != "Result" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(ok) => Some(ok),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proc_macro2::Span;

    #[test]
    fn test_implementation_ident() {
        let ident = |s: &str| Ident::new(s, Span::call_site());
        assert_eq!(implementation_ident(&ident("ITestInterface")), "TestInterfaceProxy");
        assert_eq!(implementation_ident(&ident("Greeter")), "GreeterProxy");
        assert_eq!(implementation_ident(&ident("Iterable")), "IterableProxy");
    }

    #[test]
    fn test_result_ok_type() {
        let ty: Type = syn::parse_quote!(anyhow::Result<Option<String>>);
        let expected: Type = syn::parse_quote!(Option<String>);
        assert_eq!(result_ok_type(&ty), Some(&expected));

        let ty: Type = syn::parse_quote!(std::result::Result<(), MyError>);
        let expected: Type = syn::parse_quote!(());
        assert_eq!(result_ok_type(&ty), Some(&expected));

        let ty: Type = syn::parse_quote!(Vec<Result<i32, String>>);
        assert_eq!(result_ok_type(&ty), None);
    }
}
