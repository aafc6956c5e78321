use std::path::Path;

use quote::{format_ident, quote};
use walkdir::{DirEntry, WalkDir};

fn is_lox_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file() && entry.path().extension() == Some("lox".as_ref())
}

/// Expands to one `#[test]` per `.lox` file in `bin/tests/suite`, each one
/// handing the file's contents to `lox_expect`. Nested directories become
/// part of the test name: `suite/a/b-c.lox` gives `test_a_b_c`.
#[proc_macro]
pub fn generate_tests(_: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let suite_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../suite");

    let tests = WalkDir::new(&suite_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(is_lox_file)
        .map(|entry| {
            let path = entry.path().to_string_lossy().into_owned();
            let name = entry
                .path()
                .strip_prefix(&suite_dir)
                .unwrap_or(entry.path())
                .with_extension("")
                .to_string_lossy()
                .replace(['/', '\\', '-', '.'], "_");
            let test_ident = format_ident!("test_{}", name);

            quote! {
                #[test]
                fn #test_ident() {
                    let source = std::fs::read_to_string(#path).unwrap();
                    lox_expect(&source);
                }
            }
        });

    quote! {
        #[ctor::ctor]
        fn init_logging() {
            let _ = env_logger::builder().is_test(true).try_init();
        }

        #(#tests)*
    }
    .into()
}
