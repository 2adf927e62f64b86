// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
#[allow(dead_code)]
pub fn generate_document(sections: usize) -> String {
    let mut content = String::new();
    for section in 0..sections {
        content.push_str(&format!(";;;見出し2;;; Section {section} ;;;\n\n"));
        content.push_str(&generate_section_body(section));
        content.push('\n');
    }
    content
}

#[allow(dead_code)]
fn generate_section_body(section: usize) -> String {
    let mut body = String::new();
    body.push_str("Some paragraph text with #太字#bold## and #ルビ#漢字(かんじ)## markers.\n\n");
    body.push_str(";;;枠線\n");
    for i in 0..3 {
        body.push_str(&format!("- item {i} in section {section}\n  - nested #下線#detail##\n"));
    }
    body.push_str(";;;\n\n");
    if section % 3 == 0 {
        body.push_str(";;;太字+イタリック+ハイライト color=ff0\nCompound block body\n;;;\n\n");
    }
    body
}
