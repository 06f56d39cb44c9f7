//! Scripted bridge device used by the integration tests.
//!
//! The mock implements the HID-SIO framing protocol over the crate's
//! transport traits: it reassembles request frames, serves a small
//! in-memory firmware (device info, I2C/SPI echo transfers, GPIO
//! registers) and fragments its responses back into 64-byte frames.
//! Tests can inject faults through the shared [`Behavior`] struct.

// Each test binary uses a different subset of this module.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::ffi::{CStr, CString};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use usbsio_hid::{Backend, Result, SioDeviceInfo, Transport};

/// Routes `log` output to the test harness when `RUST_LOG` is set.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const FRAME_SIZE: usize = 64;
const HEADER_SIZE: usize = 8;
const DATA_SIZE: usize = FRAME_SIZE - HEADER_SIZE;

// Request codes of the bridge protocol.
pub const DEV_INFO: u8 = 0x01;
pub const I2C_INIT: u8 = 0x10;
pub const I2C_DEINIT: u8 = 0x11;
pub const I2C_WRITE: u8 = 0x12;
pub const I2C_READ: u8 = 0x13;
pub const I2C_XFER: u8 = 0x14;
pub const I2C_RESET: u8 = 0x15;
pub const SPI_INIT: u8 = 0x20;
pub const SPI_DEINIT: u8 = 0x21;
pub const SPI_XFER: u8 = 0x22;
pub const SPI_RESET: u8 = 0x23;
pub const GPIO_PORT_VALUE: u8 = 0x30;
pub const GPIO_PORT_DIR: u8 = 0x31;
pub const GPIO_TOGGLE_PIN: u8 = 0x32;
pub const GPIO_IOCONFIG: u8 = 0x33;

/// Fault injection knobs, shared with the test body.
#[derive(Default)]
pub struct Behavior {
    /// Answer the next request with this status code instead of OK.
    pub fail_next_status: Option<u8>,
    /// Refuse the device-info query with an error status.
    pub fail_dev_info: bool,
    /// Hold the next response back; it is flushed in front of the response
    /// to the request after it, arriving as stale frames.
    pub hold_next_response: bool,
    /// Answer the next I2C fast transfer with a status-only frame carrying
    /// no data bytes, as write-only firmware exchanges do.
    pub empty_next_xfer: bool,
    /// Delay before each response becomes readable.
    pub response_delay: Duration,
}

/// Everything observable about one mock device.
pub struct DeviceState {
    pub behavior: Behavior,
    /// GPIO value registers, one per port.
    pub gpio_values: Vec<u32>,
    /// GPIO direction registers, one per port.
    pub gpio_dirs: Vec<u32>,
    /// Bytes of the last I2C/SPI write payload, without the parameter block.
    pub last_write: Vec<u8>,
    /// Options byte of the last SPI transfer parameter block.
    pub last_spi_options: u8,
    /// Transaction ids in the order requests completed.
    pub served_trans_ids: Vec<u8>,
    /// Request codes in the order requests completed.
    pub served_reqs: Vec<u8>,
}

pub struct MockDevice {
    pub info: SioDeviceInfo,
    pub num_i2c: u8,
    pub num_spi: u8,
    pub num_gpio: u8,
    pub max_data_size: u32,
    pub state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    pub fn new(index: usize) -> Self {
        let num_gpio = 2;
        Self {
            info: SioDeviceInfo {
                vid: 0x1FC9,
                pid: 0x0090,
                path: CString::new(format!("mock-{}", index)).unwrap(),
                serial_number: Some(format!("MOCK{:04}", index)),
                manufacturer_string: Some("NXP Semiconductors".to_string()),
                product_string: Some("LPCSIO Test Bridge".to_string()),
                interface_number: 0,
            },
            num_i2c: 2,
            num_spi: 2,
            num_gpio,
            max_data_size: 1024,
            state: Arc::new(Mutex::new(DeviceState {
                behavior: Behavior::default(),
                gpio_values: vec![0; num_gpio as usize],
                gpio_dirs: vec![0; num_gpio as usize],
                last_write: Vec::new(),
                last_spi_options: 0,
                served_trans_ids: Vec::new(),
                served_reqs: Vec::new(),
            })),
        }
    }
}

/// Backend serving a fixed set of mock devices.
pub struct MockBackend {
    devices: Vec<MockDevice>,
}

impl MockBackend {
    pub fn new(count: usize) -> Self {
        Self {
            devices: (0..count).map(MockDevice::new).collect(),
        }
    }

    /// Shared state of device `index`, for inspection and fault injection.
    pub fn state(&self, index: usize) -> Arc<Mutex<DeviceState>> {
        Arc::clone(&self.devices[index].state)
    }

    /// Replaces the product string of device `index` before enumeration.
    pub fn set_product(&mut self, index: usize, product: Option<&str>) {
        self.devices[index].info.product_string = product.map(String::from);
    }
}

impl Backend for MockBackend {
    fn enumerate(&mut self, vid: u16, pid: u16) -> Result<Vec<SioDeviceInfo>> {
        Ok(self
            .devices
            .iter()
            .filter(|d| {
                (vid == 0 || d.info.vid == vid) && (pid == 0 || d.info.pid == pid)
            })
            .map(|d| d.info.clone())
            .collect())
    }

    fn open(&mut self, path: &CStr) -> Result<Box<dyn Transport>> {
        let device = self
            .devices
            .iter()
            .find(|d| d.info.path.as_c_str() == path)
            .unwrap_or_else(|| panic!("mock backend has no device at {:?}", path));
        Ok(Box::new(MockTransport {
            num_i2c: device.num_i2c,
            num_spi: device.num_spi,
            num_gpio: device.num_gpio,
            max_data_size: device.max_data_size,
            state: Arc::clone(&device.state),
            request: Vec::new(),
            responses: VecDeque::new(),
            held: Vec::new(),
        }))
    }
}

struct MockTransport {
    num_i2c: u8,
    num_spi: u8,
    num_gpio: u8,
    max_data_size: u32,
    state: Arc<Mutex<DeviceState>>,
    /// Payload bytes of the request currently being reassembled.
    request: Vec<u8>,
    /// Response frames ready to be read.
    responses: VecDeque<[u8; FRAME_SIZE]>,
    /// Response frames held back by fault injection.
    held: Vec<[u8; FRAME_SIZE]>,
}

impl Transport for MockTransport {
    fn write_report(&mut self, report: &[u8]) -> Result<usize> {
        assert_eq!(report.len(), FRAME_SIZE + 1, "report id byte expected");
        assert_eq!(report[0], 0, "report id must be zero");
        let frame = &report[1..];
        let trans_id = frame[0];
        let port = frame[1];
        let req = frame[2];
        let packet_num = frame[3] as usize;
        let packet_len = u16::from_le_bytes([frame[4], frame[5]]) as usize;
        let transfer_len = u16::from_le_bytes([frame[6], frame[7]]) as usize;

        self.request
            .extend_from_slice(&frame[HEADER_SIZE..packet_len]);
        if packet_num * FRAME_SIZE + packet_len == transfer_len {
            let payload = std::mem::take(&mut self.request);
            self.serve(trans_id, port, req, &payload);
        }
        Ok(report.len())
    }

    fn read_report(&mut self, buf: &mut [u8], _timeout_ms: i32) -> Result<usize> {
        let delay = self.state.lock().unwrap().behavior.response_delay;
        if !delay.is_zero() && !self.responses.is_empty() {
            std::thread::sleep(delay);
        }
        match self.responses.pop_front() {
            Some(frame) => {
                buf[..FRAME_SIZE].copy_from_slice(&frame);
                Ok(FRAME_SIZE)
            }
            None => Ok(0),
        }
    }
}

impl MockTransport {
    fn serve(&mut self, trans_id: u8, port: u8, req: u8, payload: &[u8]) {
        let reply = {
            let mut state = self.state.lock().unwrap();
            state.served_trans_ids.push(trans_id);
            state.served_reqs.push(req);

            if let Some(status) = state.behavior.fail_next_status.take() {
                Err(status)
            } else {
                self.handle(&mut state, port, req, payload)
            }
        };

        let frames: Vec<[u8; FRAME_SIZE]> = match reply {
            Ok(data) => response_frames(trans_id, port, 0, &data),
            Err(status) => response_frames(trans_id, port, status, &[]),
        };

        let mut state = self.state.lock().unwrap();
        if state.behavior.hold_next_response {
            state.behavior.hold_next_response = false;
            self.held = frames;
        } else {
            for f in self.held.drain(..) {
                self.responses.push_back(f);
            }
            self.responses.extend(frames);
        }
    }

    fn handle(
        &self,
        state: &mut DeviceState,
        port: u8,
        req: u8,
        payload: &[u8],
    ) -> std::result::Result<Vec<u8>, u8> {
        match req {
            DEV_INFO => {
                if state.behavior.fail_dev_info {
                    return Err(0x11); // invalid command
                }
                let mut data = vec![self.num_i2c, self.num_spi, self.num_gpio, 0];
                data.extend_from_slice(&self.max_data_size.to_le_bytes());
                data.extend_from_slice(&0x0002_0003u32.to_le_bytes());
                data.extend_from_slice(b"HID-SIO mock build\0");
                Ok(data)
            }
            I2C_INIT | I2C_DEINIT | I2C_RESET | SPI_INIT | SPI_DEINIT | SPI_RESET => {
                Ok(Vec::new())
            }
            I2C_WRITE => {
                state.last_write = payload[4..].to_vec();
                Ok(Vec::new())
            }
            I2C_READ => {
                let len = u16::from_le_bytes([payload[0], payload[1]]) as usize;
                let addr = payload[3];
                Ok((0..len).map(|i| addr.wrapping_add(i as u8)).collect())
            }
            I2C_XFER => {
                let tx_len = u16::from_le_bytes([payload[0], payload[1]]) as usize;
                let rx_len = u16::from_le_bytes([payload[2], payload[3]]) as usize;
                state.last_write = payload[8..8 + tx_len].to_vec();
                if state.behavior.empty_next_xfer {
                    state.behavior.empty_next_xfer = false;
                    return Ok(Vec::new());
                }
                Ok((0..rx_len).map(|i| (i as u8) ^ 0x5A).collect())
            }
            SPI_XFER => {
                let data = &payload[4..];
                state.last_write = data.to_vec();
                state.last_spi_options = payload[2];
                // Echo with bits inverted so tests can tell rx from tx.
                Ok(data.iter().map(|b| !b).collect())
            }
            GPIO_PORT_VALUE | GPIO_PORT_DIR => {
                let set = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
                let clear = u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
                let regs = if req == GPIO_PORT_VALUE {
                    &mut state.gpio_values
                } else {
                    &mut state.gpio_dirs
                };
                let reg = regs.get_mut(port as usize).ok_or(0x12u8)?;
                *reg = (*reg | set) & !clear;
                Ok(reg.to_le_bytes().to_vec())
            }
            GPIO_TOGGLE_PIN => {
                let pin = payload[0];
                let reg = state.gpio_values.get_mut(port as usize).ok_or(0x12u8)?;
                *reg ^= 1 << pin;
                Ok(Vec::new())
            }
            GPIO_IOCONFIG => Ok(Vec::new()),
            _ => Err(0x11),
        }
    }
}

/// Fragments a response payload into status frames, mirroring the device
/// firmware's framing.
fn response_frames(trans_id: u8, port: u8, status: u8, payload: &[u8]) -> Vec<[u8; FRAME_SIZE]> {
    let count = if payload.is_empty() {
        1
    } else {
        payload.len().div_ceil(DATA_SIZE)
    };
    let transfer_len = (payload.len() + count * HEADER_SIZE) as u16;

    let mut frames = Vec::with_capacity(count);
    for i in 0..count {
        let chunk = &payload[i * DATA_SIZE..(i * DATA_SIZE + DATA_SIZE).min(payload.len())];
        let mut frame = [0u8; FRAME_SIZE];
        frame[0] = trans_id;
        frame[1] = port;
        frame[2] = status;
        frame[3] = i as u8;
        frame[4..6].copy_from_slice(&((chunk.len() + HEADER_SIZE) as u16).to_le_bytes());
        frame[6..8].copy_from_slice(&transfer_len.to_le_bytes());
        frame[HEADER_SIZE..HEADER_SIZE + chunk.len()].copy_from_slice(chunk);
        frames.push(frame);
    }
    frames
}
