use pagering::RingBuffer;

fn main() {
    env_logger::init();

    println!("pagering Basic Example");
    println!("======================\n");

    // Size 0 asks for the minimum geometry: two producer pages.
    let mut ring = RingBuffer::new(0);
    println!("{}", ring.state());

    const N: usize = 256;

    // Write N NUL-terminated records.
    for i in 0..N {
        let mut record = format!("ringbufdata{i}\n").into_bytes();
        record.push(0);
        ring.write(&record).expect("two pages hold 256 short records");
    }

    // Drain them back in FIFO order.
    for _ in 0..N {
        let item = ring.consume().expect("record pending");
        let text = std::str::from_utf8(&item.payload()[..item.payload_len() - 1]).unwrap();
        print!("read from ring, len: {}, {}", item.payload_len(), text);
    }

    // A second burst reuses the pages the drain recycled.
    for i in 0..16 {
        let mut record = format!("ringbufdata{i}\n").into_bytes();
        record.push(0);
        ring.write(&record).unwrap();
    }

    println!("\n{}", ring.state());
}
