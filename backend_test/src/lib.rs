use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// The store a test runs against.
#[derive(Copy, Clone, PartialEq, Eq)]
enum Backend {
    Memory,
    Mongodb,
}

/// Transform an asynchronous test into a synchronous one, inject dependencies,
/// and ensure that test state is cleared regardless of how the test terminates.
///
/// `#[backend_test]` runs against a fresh in-memory store.
/// `#[backend_test(mongodb)]` runs against a fresh MongoDB database. These
/// tests are ignored by default, run them with `cargo test -- --ignored`
/// once a test deployment is configured.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// `crate::model::store::DynStore`, and (MongoDB only) [`mongodb::Database`].
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    let backend = match parse_macro_input!(args as Option<Ident>) {
        None => Backend::Memory,
        Some(arg) if arg == "mongodb" => Backend::Mongodb,
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected no argument or `mongodb`")
                .into_compile_error()
                .into();
        }
    };

    // Extract the injected parameters and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone(), backend) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    let (setup, ignore) = match backend {
        Backend::Memory => (quote! { crate::testing::memory_backend().await }, quote! {}),
        Backend::Mongodb => (
            quote! { crate::testing::mongodb_backend().await },
            quote! { #[ignore = "needs a MongoDB deployment, see `TALLY_TEST_DB_URI`"] },
        ),
    };

    // Rewrite the test function.
    quote! {
        #[test]
        #ignore
        fn #name() {
            /// Test setup.
            async fn setup() -> crate::testing::TestBackend {
                #setup
            }

            /// The test itself.
            #item_fn

            // Create an async runtime. We need a separate one for inside and
            // outside the `catch_unwind`.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup.
            let crate::testing::TestBackend {
                client: rocket_client,
                store,
                db,
                chart_dir,
            } = outer_runtime.block_on(setup());

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let client_mutex = std::sync::Mutex::new(rocket_client);
            let store_mutex = std::sync::Mutex::new(store);
            let db_mutex = std::sync::Mutex::new(db.clone());
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                #[allow(unused_variables)]
                let rocket_client = client_mutex.into_inner().unwrap();
                #[allow(unused_variables)]
                let store = store_mutex.into_inner().unwrap();
                #[allow(unused_variables)]
                let db = db_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                runtime.block_on(#new_name(#(#test_args),*));
            });

            // Run the cleanup.
            outer_runtime.block_on(crate::testing::cleanup(db, chart_dir));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::panic_any(cause);
            }
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature, backend: Backend) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_store = false;
    let mut has_db = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                // The last path segment names the type, however it is qualified.
                let type_ident = type_path.path.segments.last().map(|s| &s.ident);
                match type_ident {
                    Some(ident) if ident == "Client" => {
                        if has_client {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `rocket::local::asynchronous::Client`",
                            ));
                        }
                        has_client = true;
                        args.push(quote! { rocket_client });
                        continue;
                    }
                    Some(ident) if ident == "DynStore" => {
                        if has_store {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `DynStore`",
                            ));
                        }
                        has_store = true;
                        args.push(quote! { store.clone() });
                        continue;
                    }
                    Some(ident) if ident == "Database" => {
                        if backend != Backend::Mongodb {
                            return Err(syn::Error::new(
                                input.span(),
                                "`mongodb::Database` can only be injected into `#[backend_test(mongodb)]` tests",
                            ));
                        }
                        if has_db {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `mongodb::Database`",
                            ));
                        }
                        has_db = true;
                        args.push(quote! { db.clone().unwrap() });
                        continue;
                    }
                    _ => {}
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client`, `store_ident: DynStore` or `db_ident: Database`",
        ));
    }

    Ok(args)
}
