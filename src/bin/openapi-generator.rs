use std::{env, fs};

use ascendia_back::services::documentation::ApiDoc;
use utoipa::OpenApi;

/// Print the OpenAPI document, or write it to the path given as first argument.
fn main() {
    let doc = ApiDoc::openapi().to_pretty_json().unwrap();
    match env::args().nth(1) {
        Some(path) => fs::write(&path, doc).unwrap(),
        None => println!("{doc}"),
    }
}
