use std::io::Write;

fn main() {
    let out_dir = std::env::var("OUT_DIR").unwrap();
    let test_file = std::path::Path::new(&out_dir).join("generated_tests.rs");
    let mut f = std::fs::File::create(&test_file).unwrap();

    println!("cargo:rerun-if-changed=tests/data");

    let mut scenarios: Vec<_> = std::fs::read_dir("tests/data")
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("toml"))
        .collect();
    scenarios.sort();

    for scenario in scenarios {
        println!("cargo:rerun-if-changed={}", scenario.display());
        let scenario_file = scenario.canonicalize().unwrap();
        let name = scenario
            .file_stem()
            .and_then(|e| e.to_str())
            .unwrap()
            .replace('-', "_");

        write!(
            f,
            "
#[test]
fn {name}_test() {{
    let scenario = include_str!({scenario_file:?});
    run_test(\"{name}\", scenario);
}}",
            name = name,
            scenario_file = scenario_file.display().to_string()
        )
        .unwrap();
    }
}
