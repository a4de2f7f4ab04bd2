use libcnb::data::build_plan::{BuildPlan, BuildPlanBuilder, Require};
use libjvmbuildpack::manifest::{Manifest, ManifestError, MAIN_CLASS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub(crate) const PLAN_ENTRY_JVM_APPLICATION: &str = "jvm-application";
pub(crate) const PLAN_ENTRY_JVM_APPLICATION_PACKAGE: &str = "jvm-application-package";
pub(crate) const PLAN_ENTRY_JRE: &str = "jre";
pub(crate) const PLAN_ENTRY_SYFT: &str = "syft";
pub(crate) const PLAN_ENTRY_JAVA_APP_SERVER: &str = "java-app-server";
pub(crate) const JAVA_APP_SERVER_TOMCAT: &str = "tomcat";

/// How the application is handed to Tomcat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum ApplicationPackaging {
    /// The application directory contains one or more `*.war` files.
    WarFiles,
    /// The application directory is itself an exploded web application.
    Exploded,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Detection {
    Skip(String),
    Pass {
        provides_application_package: bool,
    },
}

#[derive(Debug)]
pub(crate) enum DetectError {
    Manifest(ManifestError),
    WebInf(PathBuf, io::Error),
}

pub(crate) fn detect(app_dir: &Path, requested_app_server: &str) -> Result<Detection, DetectError> {
    if !requested_app_server.is_empty() && requested_app_server != JAVA_APP_SERVER_TOMCAT {
        return Ok(Detection::Skip(format!(
            "buildpack does not match requested app server of [{requested_app_server}], buildpack supports [{JAVA_APP_SERVER_TOMCAT}]"
        )));
    }

    let war_files_exist = contains_war_files(app_dir);
    if !war_files_exist && has_main_class(app_dir).map_err(DetectError::Manifest)? {
        return Ok(Detection::Skip(String::from(
            "Manifest attribute 'Main-Class' was found",
        )));
    }

    let web_inf_exists = web_inf_exists(app_dir)?;

    Ok(Detection::Pass {
        provides_application_package: web_inf_exists || war_files_exist,
    })
}

/// Decides how the application is packaged, or `None` if it is not a web application Tomcat
/// can serve.
pub(crate) fn application_packaging(
    app_dir: &Path,
) -> Result<Option<ApplicationPackaging>, DetectError> {
    if contains_war_files(app_dir) {
        return Ok(Some(ApplicationPackaging::WarFiles));
    }

    if has_main_class(app_dir).map_err(DetectError::Manifest)? || !web_inf_exists(app_dir)? {
        return Ok(None);
    }

    Ok(Some(ApplicationPackaging::Exploded))
}

#[derive(Serialize)]
struct JreRequirement {
    launch: bool,
}

pub(crate) fn build_plan(
    provides_application_package: bool,
) -> Result<BuildPlan, toml::ser::Error> {
    let mut jre = Require::new(PLAN_ENTRY_JRE);
    jre.metadata(JreRequirement { launch: true })?;

    let mut builder = BuildPlanBuilder::new()
        .provides(PLAN_ENTRY_JVM_APPLICATION)
        .provides(PLAN_ENTRY_JAVA_APP_SERVER);

    if provides_application_package {
        builder = builder.provides(PLAN_ENTRY_JVM_APPLICATION_PACKAGE);
    }

    Ok(builder
        .requires(PLAN_ENTRY_SYFT)
        .requires(jre)
        .requires(PLAN_ENTRY_JVM_APPLICATION_PACKAGE)
        .requires(PLAN_ENTRY_JVM_APPLICATION)
        .requires(PLAN_ENTRY_JAVA_APP_SERVER)
        .build())
}

/// Only the top level of the application directory is searched. An unreadable directory
/// counts as one without WAR files.
pub(crate) fn contains_war_files(app_dir: &Path) -> bool {
    fs::read_dir(app_dir).is_ok_and(|entries| {
        entries
            .filter_map(Result::ok)
            .any(|entry| entry.file_name().to_string_lossy().ends_with(".war"))
    })
}

fn has_main_class(app_dir: &Path) -> Result<bool, ManifestError> {
    Manifest::from_app_dir(app_dir).map(|manifest| manifest.get(MAIN_CLASS).is_some())
}

fn web_inf_exists(app_dir: &Path) -> Result<bool, DetectError> {
    let path = app_dir.join("WEB-INF");

    match fs::metadata(&path) {
        Ok(_) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(DetectError::WebInf(path, error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_manifest(app_dir: &Path, contents: &str) {
        fs::create_dir_all(app_dir.join("META-INF")).unwrap();
        fs::write(app_dir.join("META-INF/MANIFEST.MF"), contents).unwrap();
    }

    #[test]
    fn skips_other_app_server() {
        let app_dir = tempdir().unwrap();

        assert_eq!(
            detect(app_dir.path(), "jetty").unwrap(),
            Detection::Skip(String::from(
                "buildpack does not match requested app server of [jetty], buildpack supports [tomcat]"
            ))
        );
    }

    #[test]
    fn passes_when_tomcat_is_requested() {
        let app_dir = tempdir().unwrap();

        assert!(matches!(
            detect(app_dir.path(), "tomcat").unwrap(),
            Detection::Pass { .. }
        ));
    }

    #[test]
    fn skips_main_class_applications() {
        let app_dir = tempdir().unwrap();
        write_manifest(app_dir.path(), "Main-Class: test-main-class\n");

        assert_eq!(
            detect(app_dir.path(), "").unwrap(),
            Detection::Skip(String::from("Manifest attribute 'Main-Class' was found"))
        );
    }

    #[test]
    fn passes_without_web_inf() {
        let app_dir = tempdir().unwrap();

        assert_eq!(
            detect(app_dir.path(), "").unwrap(),
            Detection::Pass {
                provides_application_package: false
            }
        );
    }

    #[test]
    fn provides_application_package_with_web_inf() {
        let app_dir = tempdir().unwrap();
        fs::create_dir_all(app_dir.path().join("WEB-INF")).unwrap();

        assert_eq!(
            detect(app_dir.path(), "").unwrap(),
            Detection::Pass {
                provides_application_package: true
            }
        );
    }

    #[test]
    fn war_files_win_over_main_class() {
        let app_dir = tempdir().unwrap();
        write_manifest(app_dir.path(), "Main-Class: test-main-class\n");
        fs::write(app_dir.path().join("app.war"), "").unwrap();

        assert_eq!(
            detect(app_dir.path(), "").unwrap(),
            Detection::Pass {
                provides_application_package: true
            }
        );
        assert_eq!(
            application_packaging(app_dir.path()).unwrap(),
            Some(ApplicationPackaging::WarFiles)
        );
    }

    #[test]
    fn application_packaging_requires_web_inf() {
        let app_dir = tempdir().unwrap();
        assert_eq!(application_packaging(app_dir.path()).unwrap(), None);

        fs::create_dir_all(app_dir.path().join("WEB-INF")).unwrap();
        assert_eq!(
            application_packaging(app_dir.path()).unwrap(),
            Some(ApplicationPackaging::Exploded)
        );

        write_manifest(app_dir.path(), "Main-Class: test-main-class\n");
        assert_eq!(application_packaging(app_dir.path()).unwrap(), None);
    }

    #[test]
    fn build_plan_entries() {
        let plan = toml::Value::try_from(build_plan(true).unwrap()).unwrap();

        let provides = plan["provides"]
            .as_array()
            .unwrap()
            .iter()
            .map(|provide| provide["name"].as_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(
            provides,
            ["jvm-application", "java-app-server", "jvm-application-package"]
        );

        let requires = plan["requires"].as_array().unwrap();
        let names = requires
            .iter()
            .map(|require| require["name"].as_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            [
                "syft",
                "jre",
                "jvm-application-package",
                "jvm-application",
                "java-app-server"
            ]
        );
        assert_eq!(requires[1]["metadata"]["launch"].as_bool(), Some(true));
    }

    #[test]
    fn build_plan_without_application_package() {
        let plan = toml::Value::try_from(build_plan(false).unwrap()).unwrap();

        assert_eq!(plan["provides"].as_array().unwrap().len(), 2);
    }
}
