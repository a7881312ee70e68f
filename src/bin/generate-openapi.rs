use std::fs;
use water_balance_engine::api::generate_openapi_spec;

fn main() {
    let spec = generate_openapi_spec();
    let json = serde_json::to_string_pretty(&spec).expect("failed to serialize OpenAPI spec");

    fs::write("openapi.json", json).expect("failed to write openapi.json");
    println!("generated openapi.json");
}
