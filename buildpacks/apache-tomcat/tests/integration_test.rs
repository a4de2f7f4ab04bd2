//! All integration tests are skipped by default (using the `ignore` attribute)
//! since performing builds is slow. To run them use: `cargo test -- --ignored`.

// Enable Clippy lints that are disabled by default.
// https://rust-lang.github.io/rust-clippy/stable/index.html
#![warn(clippy::pedantic)]

use libcnb::data::buildpack_id;
use libcnb::data::layer_name;
use libcnb::data::sbom::SbomFormat;
use libcnb_test::{
    assert_contains, assert_not_contains, BuildConfig, BuildpackReference, ContainerConfig,
    PackResult, SbomType, TestRunner,
};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

const BUILDER: &str = "paketobuildpacks/builder-jammy-base";
const JRE_BUILDPACK: &str = "docker://docker.io/paketobuildpacks/bellsoft-liberica";
const SYFT_BUILDPACK: &str = "docker://docker.io/paketobuildpacks/syft";
const PORT: u16 = 8080;

fn build_config(app_dir: impl AsRef<Path>) -> BuildConfig {
    let mut config = BuildConfig::new(BUILDER, app_dir);
    config.buildpacks([
        BuildpackReference::Other(String::from(JRE_BUILDPACK)),
        BuildpackReference::Other(String::from(SYFT_BUILDPACK)),
        BuildpackReference::CurrentCrate,
    ]);
    config
}

#[test]
#[ignore = "integration test"]
fn exploded_application() {
    TestRunner::default().build(build_config("tests/fixtures/exploded-app"), |context| {
        assert_contains!(context.pack_stdout, "Apache Tomcat 10.1.28");
        assert_contains!(context.pack_stdout, "Build Configuration:");
        assert_contains!(context.pack_stdout, "Mounting application at ROOT");
        assert_contains!(context.pack_stdout, "Altering catalina.properties common.loader");

        let command_output = context.run_shell_command(
            "cat /layers/jvm-buildpacks_apache-tomcat/catalina-base/bin/setenv.sh && ls /layers/jvm-buildpacks_apache-tomcat/catalina-base/webapps",
        );
        assert_contains!(
            command_output.stdout,
            "CLASSPATH=\"/layers/jvm-buildpacks_apache-tomcat/catalina-base/bin/tomcat-logging-support-3.4.0.RELEASE.jar\""
        );
        assert_contains!(command_output.stdout, "ROOT");

        context.start_container(
            ContainerConfig::new()
                .env("PORT", PORT.to_string())
                .expose_port(PORT),
            |container| {
                let address_on_host = container.address_for_port(PORT);
                let url = format!("http://{}:{}/", address_on_host.ip(), address_on_host.port());

                // Tomcat takes a while to deploy the application.
                let mut attempts_remaining = 30;
                let response = loop {
                    let response = ureq::get(&url).call();
                    if response.is_ok() || attempts_remaining == 0 {
                        break response;
                    }
                    attempts_remaining -= 1;
                    thread::sleep(Duration::from_secs(1));
                }
                .unwrap();

                let body = response.into_string().unwrap();
                assert_contains!(
                    body,
                    "Hello from Tomcat Apache Tomcat/10.1.28"
                );
            },
        );
    });
}

#[test]
#[ignore = "integration test"]
fn war_application() {
    let app_dir = war_app_dir("war-app");

    TestRunner::default().build(build_config(&app_dir), |context| {
        assert_not_contains!(context.pack_stdout, "Mounting application at");

        let command_output = context.run_shell_command("ls /workspace /workspace/exploded-app");
        assert_contains!(command_output.stdout, "index.jsp");
        assert_not_contains!(command_output.stdout, "exploded-app.war");
    });
}

#[test]
#[ignore = "integration test"]
fn context_path_and_tomcat_version() {
    let mut config = build_config("tests/fixtures/exploded-app");
    config.envs([
        ("BP_TOMCAT_CONTEXT_PATH", "/alpha/bravo/"),
        ("BP_TOMCAT_VERSION", "9.*"),
    ]);

    TestRunner::default().build(config, |context| {
        assert_contains!(context.pack_stdout, "Apache Tomcat 9.0.93");
        assert_contains!(context.pack_stdout, "Mounting application at alpha#bravo");
    });
}

#[test]
#[ignore = "integration test"]
fn rebuild_reuses_cached_layers() {
    TestRunner::default().build(build_config("tests/fixtures/exploded-app"), |context| {
        assert_not_contains!(context.pack_stdout, "Reusing cached layer");

        let config = context.config.clone();
        context.rebuild(config, |rebuild_context| {
            assert_contains!(rebuild_context.pack_stdout, "Reusing cached layer tomcat");
            assert_contains!(
                rebuild_context.pack_stdout,
                "Reusing cached layer catalina-base"
            );
        });
    });
}

#[test]
#[ignore = "integration test"]
fn access_logging_helper() {
    TestRunner::default().build(build_config("tests/fixtures/exploded-app"), |context| {
        let command_output = context.run_shell_command("echo \"${JAVA_TOOL_OPTIONS:-}\"");
        assert_not_contains!(command_output.stdout, "-Daccess.logging.enabled=true");

        context.start_container(
            ContainerConfig::new()
                .entrypoint("launcher")
                .command(["echo \"${JAVA_TOOL_OPTIONS}\""])
                .env("BPL_TOMCAT_ACCESS_LOGGING_ENABLED", "true"),
            |container| {
                assert_contains!(
                    container.logs_wait().stdout,
                    "-Daccess.logging.enabled=true"
                );
            },
        );
    });
}

#[test]
#[ignore = "integration test"]
fn layer_sboms() {
    TestRunner::default().build(build_config("tests/fixtures/exploded-app"), |context| {
        context.download_sbom_files(|sbom_files| {
            let buildpack_id = buildpack_id!("jvm-buildpacks/apache-tomcat");

            let home_sbom = fs::read_to_string(sbom_files.path_for(
                &buildpack_id,
                SbomType::Layer(layer_name!("tomcat")),
                SbomFormat::SyftJson,
            ))
            .unwrap();
            assert_contains!(home_sbom, "\"Name\": \"Apache Tomcat\"");
            assert_contains!(home_sbom, "\"Version\": \"10.1.28\"");

            let base_sbom = fs::read_to_string(sbom_files.path_for(
                &buildpack_id,
                SbomType::Layer(layer_name!("catalina-base")),
                SbomFormat::SyftJson,
            ))
            .unwrap();
            assert_contains!(base_sbom, "tomcat-access-logging-support");
            assert_contains!(base_sbom, "tomcat-lifecycle-support");
            assert_contains!(base_sbom, "tomcat-logging-support");

            assert!(sbom_files
                .path_for(&buildpack_id, SbomType::Launch, SbomFormat::SyftJson)
                .exists());
        });
    });
}

#[test]
#[ignore = "integration test"]
fn main_class_application_fails_detection() {
    let mut config = build_config("tests/fixtures/main-class-app");
    config.expected_pack_result(PackResult::Failure);

    TestRunner::default().build(config, |context| {
        assert_contains!(
            context.pack_stdout,
            "No buildpack groups passed detection."
        );
    });
}

/// Packages the exploded fixture as `exploded-app.war` in a fresh application directory.
fn war_app_dir(name: &str) -> PathBuf {
    let app_dir = std::env::temp_dir().join(name);
    let _ = fs::remove_dir_all(&app_dir);
    fs::create_dir_all(&app_dir).unwrap();

    let mut writer = zip::ZipWriter::new(File::create(app_dir.join("exploded-app.war")).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    for (entry, source) in [
        ("WEB-INF/web.xml", "tests/fixtures/exploded-app/WEB-INF/web.xml"),
        ("index.jsp", "tests/fixtures/exploded-app/index.jsp"),
    ] {
        writer.start_file(entry, options).unwrap();
        writer.write_all(&fs::read(source).unwrap()).unwrap();
    }
    writer.finish().unwrap();

    app_dir
}
