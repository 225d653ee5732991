#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut limits = tiff_metadata::Limits::default();
    limits.max_value_bytes = 1_000_000;

    let mut collector = tiff_metadata::DirectoryCollector::new();
    let mut reader = tiff_metadata::stream::ByteArrayReader::new(data);
    let _ = tiff_metadata::TiffWalker::new()
        .with_limits(limits)
        .process(&mut reader, &mut collector, 0);
    let _ = collector.into_metadata();
});
