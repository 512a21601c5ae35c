use std::fs;
use std::net::UdpSocket;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "bacnet-imagetool-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

/// Header preamble followed by frames of 10 and 3 bytes
fn write_image(dir: &Path) -> PathBuf {
    let header = [
        0x00, 0x75, 0x06, 0x00, 0x00, b'M', b'P', b'X', b'-', b'2', 0x74, 0x00, 0x00, b'1',
        b'.', b'2', 0x71, 0x00, 0x00, 0x05,
    ];
    let mut image = (header.len() as u16).to_be_bytes().to_vec();
    image.extend_from_slice(&header);
    image.extend_from_slice(&[0x00, 0x0A]);
    image.extend_from_slice(&[0x01, 0x20, 0xFF, 0xFF, 0x00, 0xFF, 0x10, 0x08, 0x00, 0x00]);
    image.extend_from_slice(&[0x00, 0x03, 0x01, 0x04, 0x00]);

    let path = dir.join("controller.img");
    fs::write(&path, image).expect("write image");
    path
}

fn imagetool(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_imagetool"))
        .current_dir(dir)
        .env("RUST_LOG", "error")
        .args(args)
        .output()
        .expect("run imagetool")
}

#[test]
fn header_prints_all_fields_in_order() {
    let dir = unique_temp_dir("header");
    write_image(&dir);

    let output = imagetool(&dir, &["header", "controller.img"]);
    assert!(output.status.success(), "{:?}", output);

    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Model_Name: MPX-2",
            "Min_Script_Version: 1.2",
            "Min_FB_Version: ",
            "Type: False",
        ]
    );
}

#[test]
fn header_prints_single_field() {
    let dir = unique_temp_dir("field");
    write_image(&dir);

    let output = imagetool(&dir, &["header", "controller.img", "--field", "min-script-version"]);
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim_end(),
        "Min_Script_Version: 1.2"
    );
}

#[test]
fn convert_writes_capture_in_working_directory() {
    let dir = unique_temp_dir("convert");
    write_image(&dir);
    fs::write(dir.join("IFConversion.pcapng"), b"stale").expect("write stale capture");

    let output = imagetool(&dir, &["convert", "controller.img"]);
    assert!(output.status.success(), "{:?}", output);
    assert!(String::from_utf8_lossy(&output.stdout)
        .contains("Finished Conversion - 2 instructions converted"));

    let capture = fs::read(dir.join("IFConversion.pcapng")).expect("read capture");
    assert_eq!(capture.len(), 24 + 52 + 10 + 52 + 3);
    assert_eq!(&capture[..4], &[0xD4, 0xC3, 0xB2, 0xA1]);
}

#[test]
fn missing_file_is_rejected() {
    let dir = unique_temp_dir("missing");

    let output = imagetool(&dir, &["header", "nothing.img"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr)
        .contains("The file provided does not exist: nothing.img"));
}

#[test]
fn replay_rejects_invalid_address_before_sending() {
    let dir = unique_temp_dir("bad-ip");
    write_image(&dir);

    let output = imagetool(&dir, &["replay", "controller.img", "192.168.1.300"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid IP address: 192.168.1.300"));
}

#[test]
fn replay_sends_frames_to_device() {
    let dir = unique_temp_dir("replay");
    write_image(&dir);
    let receiver = UdpSocket::bind("127.0.0.1:0").expect("bind receiver");
    receiver
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("set timeout");
    let port = receiver.local_addr().expect("local addr").port().to_string();

    let output = imagetool(
        &dir,
        &["replay", "controller.img", "127.0.0.1", "--port", &port, "--interval-ms", "5"],
    );
    assert!(output.status.success(), "{:?}", output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Finished Replay - 2 instructions sent"));

    let mut buffer = [0u8; 1500];
    let (len, _) = receiver.recv_from(&mut buffer).expect("first datagram");
    assert_eq!(&buffer[..4], &[0x81, 0x0A, 0x00, 0x0E]);
    assert_eq!(len, 14);
    let (len, _) = receiver.recv_from(&mut buffer).expect("second datagram");
    assert_eq!(&buffer[..len], &[0x81, 0x0A, 0x00, 0x07, 0x01, 0x04, 0x00]);
}

#[test]
fn convert_honours_output_path() {
    let dir = unique_temp_dir("convert-output");
    write_image(&dir);

    let output = imagetool(&dir, &["convert", "controller.img", "--output", "frames.pcap"]);
    assert!(output.status.success(), "{:?}", output);
    assert!(dir.join("frames.pcap").is_file());
    assert!(!dir.join("IFConversion.pcapng").exists());
}
