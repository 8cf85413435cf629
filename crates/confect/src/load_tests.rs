use super::*;
use std::ffi::OsString;
use std::sync::{LazyLock, Mutex};

use tempfile::TempDir;

static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

fn dummy_conf() -> Conf {
    let conf = Conf::new();
    conf.declare_group_with(
        "dummy",
        [
            ("opt1", Value::Int(3)),
            ("opt2", Value::from("some string")),
            ("opt3", Value::Bool(true)),
        ],
    )
    .unwrap();
    conf
}

fn vars(pairs: &[(&str, &str)]) -> Vec<(OsString, OsString)> {
    pairs
        .iter()
        .map(|(k, v)| (OsString::from(k), OsString::from(v)))
        .collect()
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_toml_file() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "conf.toml",
        "[dummy]\nopt1 = 5\nopt2 = \"other string\"\n",
    );
    let conf = dummy_conf();
    conf.load_file(&path).unwrap();
    assert!(conf.is_frozen());
    assert_eq!(conf.get("dummy", "opt1").unwrap(), Value::Int(5));
    assert_eq!(conf.get("dummy", "opt2").unwrap(), Value::from("other string"));
    assert_eq!(conf.get("dummy", "opt3").unwrap(), Value::Bool(true));
}

#[test]
fn test_load_json_file() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "conf.json", r#"{"dummy": {"opt1": 7, "opt3": false}}"#);
    let conf = dummy_conf();
    conf.load_file(&path).unwrap();
    assert_eq!(conf.get("dummy", "opt1").unwrap(), Value::Int(7));
    assert_eq!(conf.get("dummy", "opt3").unwrap(), Value::Bool(false));
}

#[test]
fn test_load_before_declare() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "early.toml", "[late]\nx = 5\nunknown = 1\n");
    let conf = Conf::new();
    conf.load_file(&path).unwrap();
    assert_eq!(conf.staged().staged_count(), 2);

    conf.declare_group_with("late", [("x", 3)]).unwrap();
    assert_eq!(conf.get("late", "x").unwrap(), Value::Int(5));
    assert!(!conf.group("late").unwrap().contains("unknown"));
    assert!(conf.staged().is_empty());
}

#[test]
fn test_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let conf = dummy_conf();
    let err = conf.load_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(err.is_not_found(), "{err}");
    assert!(conf.is_frozen());
}

#[test]
fn test_malformed_file_is_source_error() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "bad.toml", "[dummy\nopt1 = ");
    let err = dummy_conf().load_file(&path).unwrap_err();
    assert!(matches!(err, ConfError::Source { ref origin, .. } if origin.ends_with("bad.toml")));
}

#[test]
fn test_top_level_scalar_replaces_group() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "flat.toml", "dummy = 5\n");
    let err = dummy_conf().load_file(&path).unwrap_err();
    assert!(matches!(err, ConfError::FrozenGroup(ref name) if name == "dummy"));
}

#[test]
fn test_file_strings_are_not_parsed() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "quoted.toml", "[dummy]\nopt1 = \"0x10\"\nopt3 = \"no\"\n");
    let conf = dummy_conf();
    conf.load_file(&path).unwrap();
    assert_eq!(conf.get("dummy", "opt1").unwrap(), Value::Int(3));
    assert_eq!(conf.get("dummy", "opt3").unwrap(), Value::Bool(true));
    assert!(conf.staged().is_empty());
}

#[test]
fn test_partial_load_keeps_earlier_values() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "partial.json", r#"{"dummy": {"opt1": 9}, "other": 1}"#);
    let conf = dummy_conf();
    assert!(conf.load_file(&path).is_err());
    assert!(conf.is_frozen());
    assert_eq!(conf.get("dummy", "opt1").unwrap(), Value::Int(9));
}

#[test]
fn test_toml_collections_and_dates() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "rich.toml",
        "[rich]\nlist = [1, 2]\nmap = { a = \"b\" }\nratio = 3\n",
    );
    let conf = Conf::new();
    conf.declare_group_with(
        "rich",
        [
            ("list", Value::list([0])),
            ("map", Value::map([("z", "z")])),
            ("ratio", Value::Float(0.5)),
        ],
    )
    .unwrap();
    conf.load_file(&path).unwrap();
    assert_eq!(conf.get("rich", "list").unwrap(), Value::list([1, 2]));
    assert_eq!(conf.get("rich", "map").unwrap(), Value::map([("a", "b")]));
    assert_eq!(conf.get("rich", "ratio").unwrap(), Value::Float(3.0));
}

#[cfg(feature = "chrono")]
#[test]
fn test_toml_datetimes() {
    use chrono::NaiveDate;

    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "dates.toml",
        "[cal]\nday = 2018-06-01\nat = 2018-06-01T03:02:00\n",
    );
    let day = NaiveDate::from_ymd_opt(2017, 1, 1).unwrap();
    let conf = Conf::new();
    conf.declare_group_with(
        "cal",
        [
            ("day", Value::Date(day)),
            ("at", Value::DateTime(day.and_hms_opt(0, 0, 0).unwrap())),
        ],
    )
    .unwrap();
    conf.load_file(&path).unwrap();

    let expected = NaiveDate::from_ymd_opt(2018, 6, 1).unwrap();
    assert_eq!(conf.get("cal", "day").unwrap(), Value::Date(expected));
    assert_eq!(
        conf.get("cal", "at").unwrap(),
        Value::DateTime(expected.and_hms_opt(3, 2, 0).unwrap())
    );
}

#[test]
fn test_load_source_closure() {
    let conf = dummy_conf();
    conf.load_source(&|ctx: &mut LoadContext<'_>| {
        ctx.set("dummy", "opt1", 11).set("dummy", "opt2", "from code");
        Ok(())
    })
    .unwrap();
    assert_eq!(conf.get("dummy", "opt1").unwrap(), Value::Int(11));
    assert_eq!(conf.get("dummy", "opt2").unwrap(), Value::from("from code"));
}

#[test]
fn test_load_source_can_read_registry() {
    let conf = dummy_conf();
    conf.load_source(&|ctx: &mut LoadContext<'_>| {
        let base = conf.get_as::<i64>("dummy", "opt1")?;
        ctx.set("dummy", "opt1", base + 1);
        Ok(())
    })
    .unwrap();
    assert_eq!(conf.get("dummy", "opt1").unwrap(), Value::Int(4));
}

#[test]
fn test_load_source_keeps_values_written_before_error() {
    let conf = dummy_conf();
    let err = conf
        .load_source(&|ctx: &mut LoadContext<'_>| {
            ctx.set("dummy", "opt1", 8);
            Err(ConfError::Parameter("halfway".into()))
        })
        .unwrap_err();
    assert!(matches!(err, ConfError::Parameter(_)));
    assert_eq!(conf.staged().staged_count(), 1);
    assert_eq!(conf.get("dummy", "opt1").unwrap(), Value::Int(8));
}

#[test]
fn test_load_source_error_refreezes() {
    let conf = dummy_conf();
    let err = conf
        .load_source(&|_: &mut LoadContext<'_>| Err(ConfError::Parameter("nope".into())))
        .unwrap_err();
    assert!(matches!(err, ConfError::Parameter(_)));
    assert!(conf.is_frozen());
}

#[test]
fn test_load_registered_module() {
    let mut conf = dummy_conf();
    conf.register_module("settings.local", |ctx: &mut LoadContext<'_>| {
        ctx.group("dummy").set("opt1", 21);
        Ok(())
    });
    conf.load_module("settings.local").unwrap();
    assert_eq!(conf.get("dummy", "opt1").unwrap(), Value::Int(21));
}

#[test]
fn test_load_module_from_search_path() {
    let dir = TempDir::new().unwrap();
    write(&dir, "app/prod.toml", "[dummy]\nopt2 = \"prod\"\n");
    let mut conf = dummy_conf();
    conf.add_module_path(dir.path());
    conf.load_module("app.prod").unwrap();
    assert_eq!(conf.get("dummy", "opt2").unwrap(), Value::from("prod"));
}

#[test]
fn test_load_module_not_found() {
    let dir = TempDir::new().unwrap();
    let mut conf = dummy_conf();
    conf.add_module_path(dir.path());
    for name in ["app.missing", "", "app..prod", "../etc"] {
        let err = conf.load_module(name).unwrap_err();
        assert!(matches!(err, ConfError::ModuleNotFound(_)), "{name}: {err}");
    }
    assert!(conf.is_frozen());
}

#[test]
fn test_env_overrides_split_and_sort() {
    let found = env_overrides(
        "APP",
        vars(&[
            ("APP__dummy__opt2", "b"),
            ("OTHER__dummy__opt1", "x"),
            ("APP__dummy__opt1", "a"),
            ("APPLE__dummy__opt1", "x"),
        ]),
    )
    .unwrap();
    let names: Vec<_> = found.iter().map(|e| e.var.as_str()).collect();
    assert_eq!(names, ["APP__dummy__opt1", "APP__dummy__opt2"]);
    assert_eq!(found[0].group, "dummy");
    assert_eq!(found[0].property, "opt1");
    assert_eq!(found[0].raw, "a");
}

#[test]
fn test_env_overrides_reject_bad_segment_counts() {
    for name in ["APP__dummy", "APP__dummy__opt1__extra", "APP____opt1", "APP__dummy__"] {
        let err = env_overrides("APP", vars(&[(name, "1")])).unwrap_err();
        assert!(matches!(err, ConfError::MalformedEnvVar(ref var) if var == name));
    }
}

#[cfg(unix)]
#[test]
fn test_env_overrides_skip_non_utf8() {
    use std::os::unix::ffi::OsStringExt;

    let bad = vec![(
        OsString::from("APP__dummy__opt1"),
        OsString::from_vec(vec![0xff, 0xfe]),
    )];
    assert!(env_overrides("APP", bad).unwrap().is_empty());
}

#[test]
fn test_load_envvars_from_parses_by_property_type() {
    let conf = dummy_conf();
    conf.load_envvars_from(
        "APP",
        vars(&[
            ("APP__dummy__opt1", "5"),
            ("APP__dummy__opt2", "  32 "),
            ("APP__dummy__opt3", "no"),
        ]),
    )
    .unwrap();
    assert!(conf.is_frozen());
    assert_eq!(conf.get("dummy", "opt1").unwrap(), Value::Int(5));
    assert_eq!(conf.get("dummy", "opt2").unwrap(), Value::from("  32 "));
    assert_eq!(conf.get("dummy", "opt3").unwrap(), Value::Bool(false));
}

#[test]
fn test_load_envvars_stages_until_access() {
    let conf = dummy_conf();
    conf.load_envvars_from("APP", vars(&[("APP__dummy__opt1", "5")]))
        .unwrap();
    let staged = conf.staged();
    assert_eq!(staged.get("dummy").unwrap().get("opt1").unwrap(), &Value::Int(5));

    assert_eq!(conf.get("dummy", "opt1").unwrap(), Value::Int(5));
    assert!(conf.staged().is_empty());
}

#[test]
fn test_load_envvars_errors() {
    let conf = dummy_conf();
    assert!(matches!(
        conf.load_envvars_from("APP", vars(&[("APP__ghost__opt1", "1")])),
        Err(ConfError::UnknownGroup(ref g)) if g == "ghost"
    ));
    assert!(matches!(
        conf.load_envvars_from("APP", vars(&[("APP__dummy__nope", "1")])),
        Err(ConfError::UnknownProperty { .. })
    ));
    assert!(matches!(
        conf.load_envvars_from("APP", vars(&[("APP__dummy__opt1", "five")])),
        Err(ConfError::Parse(_))
    ));
    assert!(conf.is_frozen());
    assert_eq!(conf.get("dummy", "opt1").unwrap(), Value::Int(3));
}

#[test]
fn test_load_envvars_from_process_environment() {
    let _guard = ENV_LOCK.lock().unwrap();
    let key = "CONFECT_LOAD_TEST__dummy__opt1";
    // SAFETY: test-scoped env mutation guarded by a process-wide mutex.
    unsafe { std::env::set_var(key, "0x20") };

    let conf = dummy_conf();
    let result = conf.load_envvars("CONFECT_LOAD_TEST");

    // SAFETY: same mutex-guarded context as above.
    unsafe { std::env::remove_var(key) };

    result.unwrap();
    assert_eq!(conf.get("dummy", "opt1").unwrap(), Value::Int(32));
}
