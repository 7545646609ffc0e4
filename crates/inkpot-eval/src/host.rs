/// Channel for output that bypasses cell capture and goes straight to the
/// host UI, exposed to code as the `host` module.
pub trait HostChannel {
    fn send_text(&self, text: &str);

    /// `png_base64` is a base64-encoded PNG image.
    fn send_image(&self, png_base64: &str);
}
