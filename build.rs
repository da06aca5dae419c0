use std::{env, fs, path::Path};

fn main() {
    let header_template = fs::read_to_string("src/templates/header.go.tmpl")
        .expect("Something went wrong reading the Go header template.");

    let header_template_const = format!(
        "{}{}{}",
        r#"pub const HEADER_TEMPLATE: &str = r##""#,
        header_template,
        r###""##;"###
    );
    let out_dir = env::var_os("OUT_DIR").expect("OUT_DIR is set by cargo");
    let dest_path = Path::new(&out_dir).join("header_template.rs");

    fs::write(&dest_path, header_template_const).unwrap();
    println!("cargo:rerun-if-changed=src/templates/header.go.tmpl");
    println!("cargo:rerun-if-changed=build.rs");
}
