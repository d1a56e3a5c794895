use std::path::PathBuf;

use streamlog::{MirrorOverride, Severity, SinkKind, router_config};

fn main() {
    let dir = PathBuf::from("/tmp/streamlog_example_gating");
    let _ = std::fs::remove_dir_all(&dir);

    let router = router_config()
        .with_log_dir(&dir)
        .build()
        .expect("Unable to resolve log directory");

    // no host channel was injected, so this falls back to file output
    let status = router.init(SinkKind::HostDebug);
    println!("init: {status:?}, active kind: {:?}", router.active_kind());

    router
        .write("test1", Some("1"), Severity::Info, MirrorOverride::Enable)
        .unwrap();
    router.info("test2").unwrap();

    router.disable("1");
    router
        .write("test3", Some("1"), Severity::Info, MirrorOverride::Unchanged)
        .unwrap();
    router.enable("1");
    router.info("test4").unwrap();

    println!("\n--- Log files ---");
    for name in ["default", "1"] {
        let path = dir.join(format!("{name}.txt"));
        println!("{}:", path.display());
        for line in std::fs::read_to_string(&path).unwrap().lines() {
            println!("  {line}");
        }
    }
}
