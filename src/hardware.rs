use core::time::Duration;

use esp_hal::{
    Blocking,
    analog::adc::{Adc, AdcConfig, AdcPin, Attenuation},
    delay::Delay,
    gpio::{AnyPin, Input, InputConfig, Level, Output, OutputConfig, Pull},
    peripherals::{ADC1, GPIO4, LPWR},
    rtc_cntl::{Rtc, sleep::TimerWakeupSource},
    time::Instant,
};

use crate::traits::{BatterySense, DeepSleep, RangeSensor};

const TRIGGER_SETTLE_US: u32 = 2;
const TRIGGER_PULSE_US: u32 = 10;

/// HC-SR04 wired to a trigger output and an echo input
pub struct UltrasonicHardware<'a> {
    trigger: Output<'a>,
    echo: Input<'a>,
    delay: Delay,
}

impl<'a> UltrasonicHardware<'a> {
    pub fn new<TRIG, ECHO>(trigger_gpio: TRIG, echo_gpio: ECHO) -> Self
    where
        TRIG: Into<AnyPin<'a>>,
        ECHO: Into<AnyPin<'a>>,
    {
        let trigger_pin: AnyPin<'a> = trigger_gpio.into();
        let echo_pin: AnyPin<'a> = echo_gpio.into();

        let trigger = Output::new(trigger_pin, Level::Low, OutputConfig::default());
        let echo = Input::new(echo_pin, InputConfig::default().with_pull(Pull::Down));

        Self {
            trigger,
            echo,
            delay: Delay::new(),
        }
    }

    fn send_trigger(&mut self) {
        self.trigger.set_low();
        self.delay.delay_micros(TRIGGER_SETTLE_US);
        self.trigger.set_high();
        self.delay.delay_micros(TRIGGER_PULSE_US);
        self.trigger.set_low();
    }

    /// Spin until ECHO reads `high`; false once `start` is `budget_us` old
    fn wait_for_level(&self, high: bool, start: Instant, budget_us: u64) -> bool {
        while self.echo.is_high() != high {
            if start.elapsed().as_micros() >= budget_us {
                return false;
            }
        }
        true
    }
}

impl RangeSensor for UltrasonicHardware<'_> {
    fn measure_pulse_duration(&mut self, timeout_us: u32) -> u32 {
        let budget = timeout_us as u64;

        self.send_trigger();

        // All three phases share one budget
        let start = Instant::now();

        // Skip a pulse that is already in progress
        if !self.wait_for_level(false, start, budget) {
            return 0;
        }
        if !self.wait_for_level(true, start, budget) {
            return 0;
        }
        let rise = Instant::now();
        if !self.wait_for_level(false, start, budget) {
            return 0;
        }

        rise.elapsed().as_micros().min(u32::MAX as u64) as u32
    }
}

/// Battery divider on GPIO4 (ADC1 channel 3)
pub struct BatteryHardware<'a> {
    adc: Adc<'a, ADC1<'a>, Blocking>,
    pin: AdcPin<GPIO4<'a>, ADC1<'a>>,
}

impl<'a> BatteryHardware<'a> {
    pub fn new(adc_periph: ADC1<'a>, sense_gpio: GPIO4<'a>) -> Self {
        let mut config = AdcConfig::new();
        let pin = config.enable_pin(sense_gpio, Attenuation::_11dB);
        let adc = Adc::new(adc_periph, config);

        Self { adc, pin }
    }
}

impl BatterySense for BatteryHardware<'_> {
    fn read_raw(&mut self) -> Result<u16, &'static str> {
        nb::block!(self.adc.read_oneshot(&mut self.pin)).map_err(|_| "ADC read failed")
    }
}

/// RTC timer wakeup deep sleep
pub struct PowerHardware<'a> {
    rtc: Rtc<'a>,
}

impl<'a> PowerHardware<'a> {
    pub fn new(lpwr: LPWR<'a>) -> Self {
        Self {
            rtc: Rtc::new(lpwr),
        }
    }
}

impl DeepSleep for PowerHardware<'_> {
    fn deep_sleep(&mut self, duration_us: u64) -> ! {
        esp_println::println!("[SLEEP] Deep sleep for {} s", duration_us / 1_000_000);
        let timer = TimerWakeupSource::new(Duration::from_micros(duration_us));
        self.rtc.sleep_deep(&[&timer])
    }
}
