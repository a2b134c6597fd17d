use crate::common::*;

#[test]
fn test_uniq() {
    assert_eq!(uniq(vec![3, 1, 3, 2, 1]), vec![3, 1, 2]);
    assert_eq!(uniq(Vec::<String>::new()), Vec::<String>::new());
    assert_eq!(
        uniq(vec!["live".to_string(), "remix".to_string(), "live".to_string()]),
        vec!["live".to_string(), "remix".to_string()]
    );
}

#[test]
fn test_default_max_proc() {
    assert!(default_max_proc() >= 1);
    assert!(default_max_proc() <= num_cpus::get().max(1));
}

#[test]
fn test_configure_thread_pool_twice() {
    // The second call finds the pool already built and keeps it
    configure_thread_pool(2);
    configure_thread_pool(0);
    assert!(rayon::current_num_threads() >= 1);
}

#[test]
fn test_default_log_dir_names_the_app() {
    if let Some(dir) = default_log_dir() {
        assert!(dir.to_string_lossy().contains(APP_NAME));
    }
}
