//! Build the iOS xcframework and Swift bindings shared by the app and the keyboard extension
//!
//! Run: cargo run --bin generate-bindings
//!
//! Writes, relative to the repository root:
//! - `Sources/ClipshelfCore/ClipshelfCore.xcframework` (device + simulator static libs)
//! - `Sources/ClipshelfCore/clipshelfFFI.h` and `module.modulemap`
//! - `Sources/ClipshelfCoreWrapper/clipshelf.swift`

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Device and simulator slices of the xcframework
const IOS_TARGETS: [&str; 2] = ["aarch64-apple-ios", "aarch64-apple-ios-sim"];

fn main() {
    let rust_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let project_root = rust_dir.parent().expect("No parent directory");

    // Match the deployment target of the Swift targets
    env::set_var("IPHONEOS_DEPLOYMENT_TARGET", "17.0");

    println!("Building Rust library...");
    run_cmd("cargo", &["build", "--release"], &rust_dir);

    println!("Generating Swift bindings...");
    let library = if cfg!(target_os = "macos") {
        "../target/release/libclipshelf.dylib"
    } else {
        "../target/release/libclipshelf.so"
    };
    run_cmd(
        "cargo",
        &[
            "run",
            "--bin",
            "uniffi-bindgen",
            "generate",
            "--library",
            library,
            "--language",
            "swift",
            "--out-dir",
            "generated",
        ],
        &rust_dir,
    );

    let swift_dest = project_root.join("Sources/ClipshelfCore");
    let wrapper_dest = project_root.join("Sources/ClipshelfCoreWrapper");
    let generated = rust_dir.join("generated");
    fs::create_dir_all(&swift_dest).expect("Create Sources/ClipshelfCore");
    fs::create_dir_all(&wrapper_dest).expect("Create Sources/ClipshelfCoreWrapper");

    // Swift 6 concurrency + module import
    println!("Copying generated Swift file...");
    let mut swift_content =
        fs::read_to_string(generated.join("clipshelf.swift")).expect("Read swift file");
    swift_content = swift_content.replace(
        "private var initializationResult",
        "nonisolated(unsafe) private var initializationResult",
    );
    swift_content = swift_content.replace(
        "#if canImport(clipshelfFFI)",
        "#if canImport(ClipshelfCoreFFI)",
    );
    swift_content = swift_content.replace("import clipshelfFFI", "import ClipshelfCoreFFI");
    fs::write(wrapper_dest.join("clipshelf.swift"), swift_content).expect("Write swift");

    let headers = generated.join("headers");
    fs::create_dir_all(&headers).expect("Create headers dir");
    fs::copy(generated.join("clipshelfFFI.h"), headers.join("clipshelfFFI.h"))
        .expect("Copy header");
    fs::copy(generated.join("clipshelfFFI.h"), swift_dest.join("clipshelfFFI.h"))
        .expect("Copy header");

    println!("Writing modulemap...");
    let modulemap = "module ClipshelfCoreFFI {\n    header \"clipshelfFFI.h\"\n    export *\n}\n";
    fs::write(swift_dest.join("module.modulemap"), modulemap).expect("Write modulemap");
    fs::write(headers.join("module.modulemap"), modulemap).expect("Write modulemap");

    println!("Building iOS static libraries...");
    for target in IOS_TARGETS {
        run_cmd("cargo", &["build", "--release", "--target", target], &rust_dir);
    }

    let xcframework = swift_dest.join("ClipshelfCore.xcframework");
    if xcframework.exists() {
        fs::remove_dir_all(&xcframework).expect("Remove stale xcframework");
    }

    println!("Assembling xcframework...");
    let mut args: Vec<String> = vec!["-create-xcframework".to_string()];
    for target in IOS_TARGETS {
        args.push("-library".to_string());
        args.push(format!("../target/{}/release/libclipshelf.a", target));
        args.push("-headers".to_string());
        args.push(headers.to_string_lossy().into_owned());
    }
    args.push("-output".to_string());
    args.push(xcframework.to_string_lossy().into_owned());
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    run_cmd("xcodebuild", &args, &rust_dir);

    println!("Done! Bindings regenerated successfully.");
    println!("Generated files:");
    println!(
        "  - {}/clipshelf.swift (UniFFI generated)",
        wrapper_dest.display()
    );
    println!("  - {}/clipshelfFFI.h", swift_dest.display());
    println!("  - {}/module.modulemap", swift_dest.display());
    println!("  - {}", xcframework.display());
}

fn run_cmd(program: &str, args: &[&str], dir: &Path) {
    let status = Command::new(program)
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap_or_else(|e| panic!("Failed to run {}: {}", program, e));

    if !status.success() {
        panic!("{} failed with status: {}", program, status);
    }
}
