//! Sample consumer task.
//!
//! Each iteration blocks on the channel with no timeout, unpacks the sample,
//! converts the reading, hands a [`Report`] to the sink, pauses for the
//! configured delay and only then counts the event.

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::data::{MilliCelsius, SampleRx, Scale};
use crate::runtime::kernel::Kernel;
use crate::runtime::timing::{TickInstant, TickSpan};
use crate::sync::spsc::{RecvError, Timeout};
use crate::trace::{debug, error, trace};

/// One converted sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub tick: TickInstant,
    pub temperature: MilliCelsius,
}

/// Destination for reports.
pub trait ReportSink: Send {
    /// Fire-and-forget; a failing sink must not stop the consumer.
    fn emit(&mut self, report: &Report);
}

/// Collects reports in memory.
impl ReportSink for Vec<Report> {
    fn emit(&mut self, report: &Report) {
        self.push(*report);
    }
}

/// Writes `Tick <tick>:\t<temperature> E-3 <unit>` lines.
pub struct LineSink<W> {
    writer: W,
    unit: String,
}

impl<W: Write + Send> LineSink<W> {
    pub fn new(writer: W, unit: impl Into<String>) -> Self {
        Self {
            writer,
            unit: unit.into(),
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl LineSink<io::Stdout> {
    #[must_use]
    pub fn stdout(unit: impl Into<String>) -> Self {
        Self::new(io::stdout(), unit)
    }
}

impl<W: Write + Send> ReportSink for LineSink<W> {
    fn emit(&mut self, report: &Report) {
        let written = writeln!(
            self.writer,
            "Tick {}:\t{} E-3 {}",
            report.tick, report.temperature, self.unit
        )
        .and_then(|()| self.writer.flush());
        if let Err(_error) = written {
            error!(error = %_error, "report sink write failed");
        }
    }
}

/// Received-event count. Written only by the consumer that owns it.
#[derive(Debug, Default)]
pub struct EventCounter(Arc<AtomicU32>);

impl EventCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn increment(&self) {
        self.0.fetch_add(1, Ordering::Release);
    }

    #[must_use]
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    /// A read-only handle for diagnostics on other threads.
    #[must_use]
    pub fn observer(&self) -> EventObserver {
        EventObserver(Arc::clone(&self.0))
    }
}

/// Read-only view of an [`EventCounter`]. May lag the consumer.
#[derive(Debug, Clone)]
pub struct EventObserver(Arc<AtomicU32>);

impl EventObserver {
    #[must_use]
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }
}

/// The consumer task.
pub struct SampleConsumer<K, S> {
    rx: SampleRx,
    kernel: K,
    scale: Scale,
    delay: TickSpan,
    sink: S,
    events: EventCounter,
}

impl<K: Kernel, S: ReportSink> SampleConsumer<K, S> {
    pub fn new(rx: SampleRx, kernel: K, scale: Scale, delay: TickSpan, sink: S) -> Self {
        Self {
            rx,
            kernel,
            scale,
            delay,
            sink,
            events: EventCounter::new(),
        }
    }

    #[must_use]
    pub fn events(&self) -> &EventCounter {
        &self.events
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Handles one sample, blocking until it arrives.
    ///
    /// # Errors
    ///
    /// [`RecvError::Disconnected`] once the generator is gone. The counter is
    /// left untouched in that case.
    pub fn tick(&mut self) -> Result<Report, RecvError> {
        let sample = self.rx.recv(Timeout::Infinite)?.unpack();

        let report = Report {
            tick: sample.tick,
            temperature: self.scale.convert(sample.reading),
        };
        trace!(tick = %report.tick, reading = sample.reading.0, temperature = report.temperature.0, "sample converted");
        self.sink.emit(&report);

        self.kernel.delay(self.delay);
        self.events.increment();
        Ok(report)
    }

    /// Consumes until the generator disconnects.
    pub fn run(&mut self) {
        debug!(delay = self.delay.get(), "consumer loop started");
        while self.tick().is_ok() {}
        debug!(events = self.events.get(), "consumer loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ScaleConfig, WaveformConfig};
    use crate::data::{Millivolts, Sample, Transport, sample_channel};
    use crate::runtime::kernel::VirtualKernel;

    fn scale() -> Scale {
        Scale::new(&WaveformConfig::default(), &ScaleConfig::default())
    }

    fn send(tx: &crate::data::SampleTx, tick: u32, mv: u32) {
        tx.push(Transport::pack(Sample::new(TickInstant::new(tick), Millivolts(mv))))
            .unwrap();
    }

    #[test]
    fn converts_reports_delays_then_counts() {
        let kernel = Arc::new(VirtualKernel::new());
        let (tx, rx) = sample_channel();
        let mut consumer =
            SampleConsumer::new(rx, Arc::clone(&kernel), scale(), TickSpan::new(1000), Vec::<Report>::new());

        send(&tx, 1000, 5_000);
        let report = consumer.tick().unwrap();

        assert_eq!(
            report,
            Report {
                tick: TickInstant::new(1000),
                temperature: MilliCelsius(30_000)
            }
        );
        assert_eq!(consumer.sink(), &vec![report]);
        assert_eq!(kernel.tick_count(), TickInstant::new(1000));
        assert_eq!(consumer.events().get(), 1);
    }

    #[test]
    fn counter_increments_once_per_receive_in_order() {
        let kernel = Arc::new(VirtualKernel::new());
        let (tx, rx) = sample_channel();
        let mut consumer = SampleConsumer::new(rx, kernel, scale(), TickSpan::ZERO, Vec::<Report>::new());
        let observer = consumer.events().observer();

        for (i, mv) in [0, 500, 1000, 1500].into_iter().enumerate() {
            send(&tx, i as u32, mv);
            consumer.tick().unwrap();
            assert_eq!(observer.get(), i as u32 + 1);
        }

        let ticks: Vec<u32> = consumer.sink().iter().map(|r| r.tick.get()).collect();
        assert_eq!(ticks, vec![0, 1, 2, 3]);
    }

    #[test]
    fn disconnect_ends_run_without_counting() {
        let kernel = Arc::new(VirtualKernel::new());
        let (tx, rx) = sample_channel();
        let mut consumer = SampleConsumer::new(rx, kernel, scale(), TickSpan::ZERO, Vec::<Report>::new());

        send(&tx, 1, 10_000);
        drop(tx);
        consumer.run();

        assert_eq!(consumer.events().get(), 1);
        assert_eq!(consumer.sink()[0].temperature, MilliCelsius(85_000));
    }

    #[test]
    fn line_sink_formats_reference_line() {
        let mut sink = LineSink::new(Vec::new(), "Celcius");
        sink.emit(&Report {
            tick: TickInstant::new(3000),
            temperature: MilliCelsius(-25_000),
        });

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "Tick 3000:\t-25000 E-3 Celcius\n");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn line_sink_write_failure_does_not_stop_consumer() {
        let kernel = Arc::new(VirtualKernel::new());
        let (tx, rx) = sample_channel();
        let sink = LineSink::new(BrokenPipe, "Celcius");
        let mut consumer = SampleConsumer::new(rx, kernel, scale(), TickSpan::ZERO, sink);

        send(&tx, 1, 0);
        let report = consumer.tick().unwrap();

        assert_eq!(report.temperature, MilliCelsius(-25_000));
        assert_eq!(consumer.events().get(), 1);
    }

    #[test]
    fn reports_survive_postcard_round_trip() {
        let reports = vec![
            Report { tick: TickInstant::new(1000), temperature: MilliCelsius(-19_500) },
            Report { tick: TickInstant::new(u32::MAX), temperature: MilliCelsius(85_000) },
        ];

        let bytes = postcard::to_allocvec(&reports).unwrap();

        assert_eq!(postcard::from_bytes::<Vec<Report>>(&bytes).unwrap(), reports);
    }
}
