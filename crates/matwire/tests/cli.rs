use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn touch_all(dir: &Path, names: &[&str]) {
    fs::create_dir_all(dir).unwrap();
    for name in names {
        fs::write(dir.join(name), b"").unwrap();
    }
}

fn matwire(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_matwire"))
        .env("MATWIRE_CONFIG_DIR", config_dir)
        .env("RUST_LOG", "error")
        .args(args)
        .output()
        .expect("failed to run matwire")
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "matwire failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn wood_dir(root: &Path) -> String {
    let dir = root.join("wood");
    touch_all(
        &dir,
        &[
            "wood_basecolor.1001.jpg",
            "wood_basecolor.1002.jpg",
            "wood_normal.png",
            "wood_roughness.png",
            "readme.txt",
        ],
    );
    dir.to_string_lossy().into_owned()
}

#[test]
fn build_prefers_tile_capable_backend() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    let dir = wood_dir(root.path());

    let report = stdout_json(&matwire(
        &config_dir,
        &["build", &dir, "--available", "materialx"],
    ));

    assert_eq!(report["name"], "wood");
    assert_eq!(report["backend"], "materialx");
    assert_eq!(report["reason"], "tile_support");
    assert_eq!(report["textures"].as_array().unwrap().len(), 3);
    assert_eq!(report["graph"]["nodes"].as_array().unwrap().len(), 5);
    assert_eq!(report["graph"]["connections"].as_array().unwrap().len(), 3);
    let base = report["textures"]
        .as_array()
        .unwrap()
        .iter()
        .find(|entry| entry["role"] == "base_color")
        .unwrap();
    assert_eq!(base["tiles"], serde_json::json!([1001, 1002]));
}

#[test]
fn unavailable_request_falls_back() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    let dir = wood_dir(root.path());

    let report = stdout_json(&matwire(
        &config_dir,
        &[
            "build",
            &dir,
            "--backend",
            "materialx",
            "--available",
            "principledshader,redshift",
        ],
    ));

    assert_eq!(report["backend"], "redshift");
    assert_eq!(report["reason"], "tile_support");
    assert_eq!(report["fallback_from"], "materialx");
}

#[test]
fn hscript_output_wires_the_network() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    let dir = wood_dir(root.path());

    let output = matwire(
        &config_dir,
        &[
            "build",
            &dir,
            "--name",
            "oak",
            "--backend",
            "principledshader",
            "--emit",
            "hscript",
            "--parent",
            "/obj/geo/materials",
        ],
    );
    assert!(output.status.success());
    let script = String::from_utf8(output.stdout).unwrap();

    assert!(script.starts_with("opcf \"/obj/geo/materials\"\n"));
    assert!(script.contains("opadd -n principledshader::2.0 oak\n"));
    assert!(script.contains("opadd -n texture::2.0 oak_normal\n"));
    assert!(script.contains("opwire -n -o clr oak_normal -baseN oak\n"));
    assert!(script.contains("opparm oak basecolor_useTexture ( 1 )\n"));
    assert_eq!(script.matches("opwire ").count(), 3);
}

#[test]
fn recommend_reports_tile_statistics() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    let dir = wood_dir(root.path());

    let report = stdout_json(&matwire(&config_dir, &["recommend", &dir]));

    assert_eq!(report["backend"], "materialx");
    assert_eq!(report["tiles"]["sequences"], 1);
    assert_eq!(report["tiles"]["tiles"], 2);
    assert_eq!(report["tiles"]["total_files"], 4);
}

#[test]
fn capabilities_follow_config_file() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        "version = 1\n\n[backends]\npriority = [\"redshift\", \"materialx\"]\n\n[backends.available]\nmaterialx = false\n",
    )
    .unwrap();

    let report = stdout_json(&matwire(&config_dir, &["capabilities"]));

    assert_eq!(report["priority"], serde_json::json!(["redshift", "materialx"]));
    let backends = report["backends"].as_array().unwrap();
    assert_eq!(backends.len(), 2);
    assert_eq!(backends[0]["id"], "redshift");
    assert_eq!(backends[0]["available"], true);
    assert_eq!(backends[1]["available"], false);
}

#[test]
fn invalid_config_fails() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "[engine]\nmin_tiles = 0\n").unwrap();

    let output = matwire(&config_dir, &["capabilities"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("min_tiles"));
}

#[test]
fn batch_builds_one_material_per_model() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    let dir = root.path().join("props");
    touch_all(
        &dir,
        &[
            "crate.fbx",
            "barrel.obj",
            "crate_basecolor.png",
            "crate_normal.png",
            "barrel_roughness.png",
        ],
    );

    let report = stdout_json(&matwire(
        &config_dir,
        &["batch", &dir.to_string_lossy(), "--threads", "2"],
    ));

    assert_eq!(report["summary"]["total"], 2);
    assert_eq!(report["summary"]["succeeded"], 2);
    let materials = report["materials"].as_array().unwrap();
    assert_eq!(materials[0]["name"], "barrel");
    assert_eq!(materials[0]["strategy"], "full_name");
    assert_eq!(
        materials[0]["material"]["textures"].as_array().unwrap().len(),
        1
    );
    assert_eq!(materials[1]["name"], "crate");
    assert_eq!(
        materials[1]["material"]["textures"].as_array().unwrap().len(),
        2
    );
}

#[test]
fn where_reports_environment_override() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");

    let output = matwire(&config_dir, &["where"]);
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();

    assert!(text.contains(&config_dir.join("config.toml").display().to_string()));
    assert!(text.contains("MATWIRE_CONFIG_DIR"));
    assert!(text.contains("missing, using defaults"));
}
