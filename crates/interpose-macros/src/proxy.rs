// #[proxy] proc-macro implementation
//
// Generates a forwarding struct, its trait impl and the ProxyInterface
// glue for one trait.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{
    FnArg, Ident, ItemTrait, Pat, PatIdent, Result, ReturnType, Signature, TraitItem, TraitItemFn, Type,
    TypeParamBound,
};

use crate::codegen::{
    generate_from_value, generate_to_value, generate_type_ref, implementation_ident, result_ok_type,
};

/// One validated trait method.
struct ProxyMethod<'a> {
    method: &'a TraitItemFn,
    slot: usize,
    args: Vec<ProxyArg<'a>>,
}

/// One parameter: the binding used in the generated body and its
/// descriptor name. Wildcards get a positional binding.
struct ProxyArg<'a> {
    ident: Ident,
    name: String,
    ty: &'a Type,
    wildcard: bool,
}

/// Expands the #[proxy] attribute macro.
///
/// Example expansion:
/// ```ignore
/// // Input:
/// #[proxy]
/// pub trait ITestInterface {
///     fn echo(&self, value: Value) -> Value;
/// }
///
/// // Output:
/// pub trait ITestInterface {
///     fn echo(&self, value: Value) -> Value;
/// }
///
/// pub struct TestInterfaceProxy {
///     instance: ::interpose::ProxyInstance,
/// }
///
/// impl ITestInterface for TestInterfaceProxy {
///     fn echo(&self, value: Value) -> Value {
///         // box arguments, dispatch slot 0, convert the result
///     }
/// }
///
/// impl ::interpose::ProxyInterface for dyn ITestInterface {
///     // interface id, descriptor, bind
/// }
/// ```
pub fn expand_proxy(attr: TokenStream, item: ItemTrait) -> Result<TokenStream> {
    if !attr.is_empty() {
        return Err(syn::Error::new_spanned(attr, "#[proxy] takes no arguments"));
    }
    validate_trait(&item)?;

    let methods = item
        .items
        .iter()
        .enumerate()
        .map(|(slot, trait_item)| match trait_item {
            TraitItem::Fn(method) => validate_method(method, slot),
            other => Err(syn::Error::new_spanned(
                other,
                "#[proxy] traits may only contain methods",
            )),
        })
        .collect::<Result<Vec<_>>>()?;

    let trait_ident = &item.ident;
    let vis = &item.vis;
    let struct_ident = implementation_ident(trait_ident);

    let forwarding_methods = methods.iter().map(|m| generate_forwarding_method(trait_ident, m));
    let method_decls = methods.iter().map(generate_method_decl);

    let struct_doc = format!("Proxy implementation of [`{}`] generated by `#[proxy]`", trait_ident);

    Ok(quote! {
        #item

        #[doc = #struct_doc]
        #[derive(Debug, Clone)]
        #vis struct #struct_ident {
            instance: ::interpose::ProxyInstance,
        }

        impl #struct_ident {
            /// The bound proxy instance
            #vis fn instance(&self) -> &::interpose::ProxyInstance {
                &self.instance
            }
        }

        impl #trait_ident for #struct_ident {
            #(#forwarding_methods)*
        }

        impl ::interpose::ProxyInterface for dyn #trait_ident {
            fn interface_id() -> ::interpose::InterfaceId {
                ::interpose::InterfaceId::new(::core::concat!(
                    ::core::module_path!(),
                    "::",
                    ::core::stringify!(#trait_ident)
                ))
            }

            fn descriptor() -> ::interpose::InterfaceDescriptor {
                ::interpose::InterfaceDescriptor::new(
                    <Self as ::interpose::ProxyInterface>::interface_id(),
                    ::core::stringify!(#trait_ident),
                )
                #(#method_decls)*
            }

            fn bind(instance: ::interpose::ProxyInstance) -> ::std::boxed::Box<Self> {
                ::std::boxed::Box::new(#struct_ident { instance })
            }
        }
    })
}

fn validate_trait(item: &ItemTrait) -> Result<()> {
    if !item.generics.params.is_empty() || item.generics.where_clause.is_some() {
        return Err(syn::Error::new_spanned(
            &item.generics,
            "#[proxy] does not support generic traits",
        ));
    }

    for bound in &item.supertraits {
        let allowed = match bound {
            TypeParamBound::Trait(bound) => bound
                .path
                .segments
                .last()
                .is_some_and(|segment| segment.ident == "Send" || segment.ident == "Sync"),
            TypeParamBound::Lifetime(lifetime) => lifetime.ident == "static",
            _ => false,
        };
        if !allowed {
            return Err(syn::Error::new_spanned(
                bound,
                "#[proxy] traits may only require Send, Sync or 'static",
            ));
        }
    }

    Ok(())
}

fn validate_method(method: &TraitItemFn, slot: usize) -> Result<ProxyMethod<'_>> {
    let sig = &method.sig;

    if sig.asyncness.is_some() {
        return Err(syn::Error::new_spanned(
            sig.asyncness,
            "#[proxy] does not support async methods",
        ));
    }
    if !sig.generics.params.is_empty() || sig.generics.where_clause.is_some() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "#[proxy] does not support generic methods",
        ));
    }

    let mut inputs = sig.inputs.iter();
    match inputs.next() {
        Some(FnArg::Receiver(receiver)) if receiver.reference.is_some() => {}
        Some(FnArg::Receiver(receiver)) => {
            return Err(syn::Error::new_spanned(
                receiver,
                "#[proxy] methods must take &self or &mut self",
            ));
        }
        _ => {
            return Err(syn::Error::new_spanned(
                sig,
                "#[proxy] methods must take &self or &mut self",
            ));
        }
    }

    let mut args = Vec::new();
    for (index, arg) in inputs.enumerate() {
        match arg {
            FnArg::Typed(pat_type) => match &*pat_type.pat {
                Pat::Ident(pat_ident) => args.push(ProxyArg {
                    ident: pat_ident.ident.clone(),
                    name: pat_ident.ident.unraw().to_string(),
                    ty: &*pat_type.ty,
                    wildcard: false,
                }),
                Pat::Wild(_) => args.push(ProxyArg {
                    ident: format_ident!("__interpose_arg{}", index),
                    name: format!("arg{}", index),
                    ty: &*pat_type.ty,
                    wildcard: true,
                }),
                _ => {
                    return Err(syn::Error::new_spanned(
                        arg,
                        "Only simple identifiers are supported as arguments",
                    ));
                }
            },
            FnArg::Receiver(_) => {
                return Err(syn::Error::new_spanned(arg, "unexpected receiver"));
            }
        }
    }

    Ok(ProxyMethod { method, slot, args })
}

/// Trait method body: box arguments, dispatch, convert the result.
fn generate_forwarding_method(trait_ident: &Ident, m: &ProxyMethod<'_>) -> TokenStream {
    let sig = &bind_wildcards(&m.method.sig, &m.args);
    let method_ident = &sig.ident;
    let slot = m.slot;

    let args_ident = format_ident!("__interpose_args");
    let value_ident = format_ident!("__interpose_value");
    let arg_values = m.args.iter().map(|arg| generate_to_value(&arg.ident, arg.ty));

    let dispatch = quote! {
        let #args_ident: ::std::vec::Vec<::interpose::Value> = ::std::vec![#(#arg_values),*];
        let __interpose_dispatched = self.instance.dispatch(#slot, #args_ident);
    };

    let body = match &sig.output {
        ReturnType::Default => quote! {
            #dispatch
            if let ::core::result::Result::Err(__interpose_err) = __interpose_dispatched {
                ::std::panic::panic_any(__interpose_err);
            }
        },
        ReturnType::Type(_, ty) => match result_ok_type(ty) {
            Some(ok_ty) => {
                let convert = generate_from_value(&value_ident, ok_ty);
                quote! {
                    #dispatch
                    match __interpose_dispatched {
                        ::core::result::Result::Ok(#value_ident) => match #convert {
                            ::core::result::Result::Ok(__interpose_result) => {
                                ::core::result::Result::Ok(__interpose_result)
                            }
                            ::core::result::Result::Err(__interpose_err) => ::core::result::Result::Err(
                                ::core::convert::From::from(
                                    ::interpose::__private::anyhow::Error::from(__interpose_err),
                                ),
                            ),
                        },
                        ::core::result::Result::Err(__interpose_err) => {
                            ::core::result::Result::Err(::core::convert::From::from(__interpose_err))
                        }
                    }
                }
            }
            None => {
                let convert = generate_from_value(&value_ident, ty);
                quote! {
                    #dispatch
                    match __interpose_dispatched {
                        ::core::result::Result::Ok(#value_ident) => match #convert {
                            ::core::result::Result::Ok(__interpose_result) => __interpose_result,
                            ::core::result::Result::Err(__interpose_err) => ::core::panic!(
                                "{}::{}: {}",
                                ::core::stringify!(#trait_ident),
                                ::core::stringify!(#method_ident),
                                __interpose_err
                            ),
                        },
                        ::core::result::Result::Err(__interpose_err) => {
                            ::std::panic::panic_any(__interpose_err)
                        }
                    }
                }
            }
        },
    };

    quote! {
        #sig {
            #body
        }
    }
}

/// Copy of `sig` with every `_` parameter bound to its positional name.
fn bind_wildcards(sig: &Signature, args: &[ProxyArg<'_>]) -> Signature {
    let mut sig = sig.clone();
    // The receiver is always the first input
    for (input, arg) in sig.inputs.iter_mut().skip(1).zip(args) {
        if let FnArg::Typed(pat_type) = input {
            if arg.wildcard {
                *pat_type.pat = Pat::Ident(PatIdent {
                    attrs: Vec::new(),
                    by_ref: None,
                    mutability: None,
                    ident: arg.ident.clone(),
                    subpat: None,
                });
            }
        }
    }
    sig
}

/// `.method(MethodDecl::new(..).param(..).returns(..))` for the descriptor.
fn generate_method_decl(m: &ProxyMethod<'_>) -> TokenStream {
    let sig = &m.method.sig;
    let name = sig.ident.unraw().to_string();

    let params = m.args.iter().map(|arg| {
        let param_name = &arg.name;
        let type_ref = generate_type_ref(arg.ty);
        quote! { .param(#param_name, #type_ref) }
    });

    let returns = match &sig.output {
        ReturnType::Default => quote! {},
        ReturnType::Type(_, ty) => {
            let type_ref = generate_type_ref(result_ok_type(ty).unwrap_or(ty));
            quote! { .returns(#type_ref) }
        }
    };

    quote! {
        .method(::interpose::MethodDecl::new(#name) #(#params)* #returns)
    }
}
