/// The controllable outlet feeding the heater. Both calls are fire-and-forget;
/// switching to the current state again is a no-op on the device.
pub trait PowerSwitch {
    fn turn_on(&self) -> anyhow::Result<()>;
    fn turn_off(&self) -> anyhow::Result<()>;

    fn set(&self, on: bool) -> anyhow::Result<()> {
        if on {
            self.turn_on()
        } else {
            self.turn_off()
        }
    }
}
