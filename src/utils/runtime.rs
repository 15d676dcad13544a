use anyhow::Result;


/// The daemon only runs a timer, a channel consumer and blocking storage calls, so one thread is
/// enough.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
