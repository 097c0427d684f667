fn main() {
    // Host builds (`--no-default-features`) have no ESP-IDF environment to forward.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
