pub struct InlineFence;

impl InlineFence {
    pub const OPEN: u8 = b'#';
    pub const CLOSE: &'static [u8; 2] = b"##";
}
