mod integration {
    mod merge_tests;
    mod resolve_tests;
    mod scan_tests;
}
